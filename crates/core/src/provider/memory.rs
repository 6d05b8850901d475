//! In-memory circuit and report providers backed by a JSON scene
//!
//! A scene lists cells (soma + polyline sections) and named compartment
//! reports. It is what the command line tool runs on and what the integration
//! tests build by hand.

use super::{CircuitProvider, Gid, GidSet, Morphology, ReportProvider, SOMA_SECTION};
use crate::core_types::Vec3;
use crate::error::{EmsimError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Neuron made of a spherical soma and polyline sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineMorphology {
    /// Soma center
    pub soma_centroid: Vec3,
    /// Mean soma radius
    pub soma_radius: f32,
    /// Section polylines indexed by section id; entry 0 (soma) is ignored
    pub sections: Vec<Vec<Vec3>>,
}

impl PolylineMorphology {
    fn section(&self, section: u32) -> Result<&[Vec3]> {
        if section == SOMA_SECTION {
            return Err(EmsimError::InvalidParameter(
                "soma has no polyline section".to_string(),
            ));
        }
        match self.sections.get(section as usize) {
            Some(points) if !points.is_empty() => Ok(points),
            _ => Err(EmsimError::InvalidParameter(format!(
                "section {section} does not exist"
            ))),
        }
    }
}

impl Morphology for PolylineMorphology {
    fn soma_centroid(&self) -> Vec3 {
        self.soma_centroid
    }

    fn soma_mean_radius(&self) -> f32 {
        self.soma_radius
    }

    fn section_length(&self, section: u32) -> Result<f32> {
        let points = self.section(section)?;
        Ok(points.windows(2).map(|w| (w[1] - w[0]).norm()).sum())
    }

    fn section_samples(&self, section: u32, params: &[f32]) -> Result<Vec<Vec3>> {
        let points = self.section(section)?;
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(0.0);
        for w in points.windows(2) {
            total += (w[1] - w[0]).norm();
            cumulative.push(total);
        }

        let samples = params
            .iter()
            .map(|&t| {
                if total <= 0.0 {
                    return points[0];
                }
                let target = t.clamp(0.0, 1.0) * total;
                // First polyline vertex at or beyond the target arc length
                let upper = cumulative
                    .partition_point(|&length| length < target)
                    .clamp(1, points.len() - 1);
                let segment = cumulative[upper] - cumulative[upper - 1];
                if segment <= 0.0 {
                    return points[upper];
                }
                let local = (target - cumulative[upper - 1]) / segment;
                points[upper - 1] + (points[upper] - points[upper - 1]) * local
            })
            .collect();
        Ok(samples)
    }
}

/// One cell of a scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRecord {
    /// Cell identifier
    pub gid: Gid,
    /// Reference position (defaults to the soma centroid)
    #[serde(default)]
    pub position: Option<Vec3>,
    /// Cell geometry
    pub morphology: PolylineMorphology,
}

/// Circuit held entirely in memory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CircuitDescription", into = "CircuitDescription")]
pub struct MemoryCircuit {
    cells: Vec<CellRecord>,
    targets: FxHashMap<String, Vec<Gid>>,
    seed: u64,
    index: FxHashMap<Gid, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CircuitDescription {
    cells: Vec<CellRecord>,
    #[serde(default)]
    targets: FxHashMap<String, Vec<Gid>>,
    #[serde(default)]
    seed: u64,
}

impl TryFrom<CircuitDescription> for MemoryCircuit {
    type Error = EmsimError;

    fn try_from(description: CircuitDescription) -> Result<Self> {
        Self::new(description.cells, description.targets, description.seed)
    }
}

impl From<MemoryCircuit> for CircuitDescription {
    fn from(circuit: MemoryCircuit) -> Self {
        Self {
            cells: circuit.cells,
            targets: circuit.targets,
            seed: circuit.seed,
        }
    }
}

impl MemoryCircuit {
    /// Build a circuit from cells and named targets
    ///
    /// # Arguments
    /// * `cells` - Cell records, ids must be unique
    /// * `targets` - Named subsets of cell ids
    /// * `seed` - Seed for random subsampling in [`CircuitProvider::select_gids`]
    ///
    /// # Errors
    /// Fails on duplicate ids or targets naming unknown cells.
    pub fn new(
        cells: Vec<CellRecord>,
        targets: FxHashMap<String, Vec<Gid>>,
        seed: u64,
    ) -> Result<Self> {
        let mut index = FxHashMap::default();
        for (i, cell) in cells.iter().enumerate() {
            if index.insert(cell.gid, i).is_some() {
                return Err(EmsimError::Scene(format!("duplicate cell id {}", cell.gid)));
            }
        }
        for (name, gids) in &targets {
            if let Some(gid) = gids.iter().find(|gid| !index.contains_key(gid)) {
                return Err(EmsimError::Scene(format!(
                    "target '{name}' names unknown cell {gid}"
                )));
            }
        }
        Ok(Self {
            cells,
            targets,
            seed,
            index,
        })
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if the circuit has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn cell(&self, gid: Gid) -> Result<&CellRecord> {
        self.index
            .get(&gid)
            .map(|&i| &self.cells[i])
            .ok_or_else(|| EmsimError::Provider(format!("unknown cell {gid}")))
    }
}

impl CircuitProvider for MemoryCircuit {
    fn select_gids(&self, target: &str, fraction: f32) -> Result<GidSet> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(EmsimError::InvalidParameter(format!(
                "fraction must be within [0, 1], got {fraction}"
            )));
        }

        let mut gids: Vec<Gid> = if target.is_empty() {
            self.cells.iter().map(|cell| cell.gid).collect()
        } else {
            self.targets
                .get(target)
                .cloned()
                .ok_or_else(|| EmsimError::InvalidParameter(format!("unknown target '{target}'")))?
        };
        gids.sort_unstable();
        gids.dedup();

        if fraction < 1.0 {
            let keep = (fraction * gids.len() as f32).round() as usize;
            let mut rng = StdRng::seed_from_u64(self.seed);
            gids.shuffle(&mut rng);
            gids.truncate(keep);
        }
        Ok(gids.into_iter().collect())
    }

    fn load_morphologies(&self, gids: &GidSet) -> Result<Vec<Arc<dyn Morphology>>> {
        gids.iter()
            .map(|&gid| {
                let cell = self.cell(gid)?;
                Ok(Arc::new(cell.morphology.clone()) as Arc<dyn Morphology>)
            })
            .collect()
    }

    fn positions(&self, gids: &GidSet) -> Result<Vec<Vec3>> {
        gids.iter()
            .map(|&gid| {
                let cell = self.cell(gid)?;
                Ok(cell.position.unwrap_or(cell.morphology.soma_centroid))
            })
            .collect()
    }
}

/// Time series of one cell in a memory report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCell {
    /// Cell identifier
    pub gid: Gid,
    /// Compartments per section id
    pub compartment_counts: Vec<u16>,
    /// Order in which sections are laid out in the buffer (default: by id)
    #[serde(default)]
    pub section_order: Option<Vec<u32>>,
    /// Values per frame, each in buffer layout order
    pub frames: Vec<Vec<f32>>,
}

impl ReportCell {
    fn layout(&self) -> Vec<u32> {
        self.section_order
            .clone()
            .unwrap_or_else(|| (0..self.compartment_counts.len() as u32).collect())
    }

    fn compartments(&self) -> usize {
        self.compartment_counts.iter().map(|&c| c as usize).sum()
    }
}

/// Compartment report held entirely in memory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ReportDescription", into = "ReportDescription")]
pub struct MemoryReport {
    description: ReportDescription,
    index: FxHashMap<Gid, usize>,
    mapped: Vec<usize>,
    offsets: Vec<Vec<u64>>,
    counts: Vec<Vec<u16>>,
    frame_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReportDescription {
    start_time: f32,
    end_time: f32,
    timestep: f32,
    data_unit: String,
    cells: Vec<ReportCell>,
}

impl TryFrom<ReportDescription> for MemoryReport {
    type Error = EmsimError;

    fn try_from(d: ReportDescription) -> Result<Self> {
        Self::new(d.start_time, d.end_time, d.timestep, d.data_unit, d.cells)
    }
}

impl From<MemoryReport> for ReportDescription {
    fn from(report: MemoryReport) -> Self {
        report.description
    }
}

impl MemoryReport {
    /// Build a report and validate its layout
    ///
    /// Frames cover `[start_time, end_time)` every `timestep`. The mapping
    /// starts empty until [`ReportProvider::update_mapping`] is called.
    ///
    /// # Errors
    /// Fails on a non-positive time step, duplicate cells, a section order
    /// that is not a permutation of the section ids, or frames whose length
    /// differs from the compartment total. Cells without any frame are
    /// rejected too.
    pub fn new(
        start_time: f32,
        end_time: f32,
        timestep: f32,
        data_unit: impl Into<String>,
        cells: Vec<ReportCell>,
    ) -> Result<Self> {
        if timestep <= 0.0 || !timestep.is_finite() {
            return Err(EmsimError::Scene(format!(
                "report time step must be positive, got {timestep}"
            )));
        }

        let mut index = FxHashMap::default();
        for (i, cell) in cells.iter().enumerate() {
            if index.insert(cell.gid, i).is_some() {
                return Err(EmsimError::Scene(format!(
                    "duplicate report cell {}",
                    cell.gid
                )));
            }

            let mut layout = cell.layout();
            layout.sort_unstable();
            if !layout.iter().copied().eq(0..cell.compartment_counts.len() as u32) {
                return Err(EmsimError::Scene(format!(
                    "section order of cell {} is not a permutation of its sections",
                    cell.gid
                )));
            }

            if cell.frames.is_empty() {
                return Err(EmsimError::Scene(format!("cell {} has no frames", cell.gid)));
            }

            let compartments = cell.compartments();
            if let Some(frame) = cell.frames.iter().find(|f| f.len() != compartments) {
                return Err(EmsimError::Scene(format!(
                    "cell {} has a frame of {} values, expected {compartments}",
                    cell.gid,
                    frame.len()
                )));
            }
        }

        Ok(Self {
            description: ReportDescription {
                start_time,
                end_time,
                timestep,
                data_unit: data_unit.into(),
                cells,
            },
            index,
            mapped: Vec::new(),
            offsets: Vec::new(),
            counts: Vec::new(),
            frame_size: 0,
        })
    }

    fn frame_index(&self, time: f32) -> Result<usize> {
        let d = &self.description;
        let position = ((time - d.start_time) / d.timestep).round();
        // An empty mapping reads zero-length frames at any in-range time
        let stored = self
            .mapped
            .iter()
            .map(|&i| d.cells[i].frames.len())
            .min()
            .unwrap_or(usize::MAX);
        if position < 0.0 || time >= d.end_time {
            return Err(EmsimError::Provider(format!(
                "time {time} is outside the report [{} {})",
                d.start_time, d.end_time
            )));
        }
        let frame = position as usize;
        if frame >= stored {
            return Err(EmsimError::Provider(format!(
                "no frame stored at time {time}, only {stored} available"
            )));
        }
        Ok(frame)
    }
}

impl ReportProvider for MemoryReport {
    fn start_time(&self) -> f32 {
        self.description.start_time
    }

    fn end_time(&self) -> f32 {
        self.description.end_time
    }

    fn timestep(&self) -> f32 {
        self.description.timestep
    }

    fn data_unit(&self) -> &str {
        &self.description.data_unit
    }

    fn update_mapping(&mut self, gids: &GidSet) -> Result<()> {
        let mut mapped = Vec::with_capacity(gids.len());
        let mut offsets = Vec::with_capacity(gids.len());
        let mut counts = Vec::with_capacity(gids.len());
        let mut next_offset = 0u64;

        for gid in gids {
            let i = *self
                .index
                .get(gid)
                .ok_or_else(|| EmsimError::Provider(format!("cell {gid} not in report")))?;
            let cell = &self.description.cells[i];

            let mut cell_offsets = vec![0u64; cell.compartment_counts.len()];
            for section in cell.layout() {
                cell_offsets[section as usize] = next_offset;
                next_offset += u64::from(cell.compartment_counts[section as usize]);
            }

            mapped.push(i);
            offsets.push(cell_offsets);
            counts.push(cell.compartment_counts.clone());
        }

        self.mapped = mapped;
        self.offsets = offsets;
        self.counts = counts;
        self.frame_size = next_offset as usize;
        Ok(())
    }

    fn offsets(&self) -> &[Vec<u64>] {
        &self.offsets
    }

    fn compartment_counts(&self) -> &[Vec<u16>] {
        &self.counts
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn load_frame(&self, time: f32) -> Result<Vec<f32>> {
        let frame = self.frame_index(time)?;
        let mut values = Vec::with_capacity(self.frame_size);
        for &i in &self.mapped {
            values.extend_from_slice(&self.description.cells[i].frames[frame]);
        }
        Ok(values)
    }
}

/// Circuit plus named reports, as read from a scene file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Cells and targets
    pub circuit: MemoryCircuit,
    /// Reports by name
    pub reports: FxHashMap<String, MemoryReport>,
}

impl Scene {
    /// Parse a scene from JSON text
    ///
    /// # Errors
    /// Returns [`EmsimError::Scene`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EmsimError::Scene(e.to_string()))
    }

    /// Read a scene file
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| EmsimError::io(path, e))?;
        Self::from_json_str(&contents)
    }

    /// Copy of the report called `name`
    ///
    /// # Errors
    /// Fails if no such report exists.
    pub fn report(&self, name: &str) -> Result<MemoryReport> {
        self.reports
            .get(name)
            .cloned()
            .ok_or_else(|| EmsimError::Scene(format!("unknown report '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_cell(gid: Gid, x: f32) -> CellRecord {
        CellRecord {
            gid,
            position: None,
            morphology: PolylineMorphology {
                soma_centroid: Vec3::new(x, 0.0, 0.0),
                soma_radius: 5.0,
                sections: vec![
                    vec![],
                    vec![
                        Vec3::new(x, 0.0, 0.0),
                        Vec3::new(x, 10.0, 0.0),
                        Vec3::new(x, 10.0, 30.0),
                    ],
                ],
            },
        }
    }

    #[test]
    fn test_polyline_length_and_samples() {
        let cell = straight_cell(1, 0.0);
        let morphology = &cell.morphology;
        assert_relative_eq!(morphology.section_length(1).unwrap(), 40.0);

        let points = morphology.section_samples(1, &[0.0, 0.125, 0.25, 0.5, 1.0]).unwrap();
        assert_relative_eq!(points[0], Vec3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(points[1], Vec3::new(0.0, 5.0, 0.0));
        assert_relative_eq!(points[2], Vec3::new(0.0, 10.0, 0.0));
        assert_relative_eq!(points[3], Vec3::new(0.0, 10.0, 10.0));
        assert_relative_eq!(points[4], Vec3::new(0.0, 10.0, 30.0));
    }

    #[test]
    fn test_missing_section() {
        let cell = straight_cell(1, 0.0);
        assert!(cell.morphology.section_length(0).is_err());
        assert!(cell.morphology.section_samples(7, &[0.5]).is_err());
    }

    #[test]
    fn test_select_gids_fraction_is_deterministic() {
        let cells = (0..10).map(|gid| straight_cell(gid, gid as f32)).collect();
        let circuit = MemoryCircuit::new(cells, FxHashMap::default(), 7).unwrap();

        let all = circuit.select_gids("", 1.0).unwrap();
        assert_eq!(all.len(), 10);

        let half = circuit.select_gids("", 0.5).unwrap();
        assert_eq!(half.len(), 5);
        assert_eq!(half, circuit.select_gids("", 0.5).unwrap());
        assert!(half.is_subset(&all));

        assert!(circuit.select_gids("", 1.5).is_err());
        assert!(circuit.select_gids("missing", 1.0).is_err());
    }

    #[test]
    fn test_targets() {
        let cells = (0..4).map(|gid| straight_cell(gid, 0.0)).collect();
        let mut targets = FxHashMap::default();
        targets.insert("pair".to_string(), vec![3, 1]);
        let circuit = MemoryCircuit::new(cells, targets, 0).unwrap();
        let gids = circuit.select_gids("pair", 1.0).unwrap();
        assert_eq!(gids.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_report_mapping_respects_section_order() {
        let cells = vec![
            ReportCell {
                gid: 2,
                compartment_counts: vec![1, 2, 0, 3],
                section_order: Some(vec![0, 3, 1, 2]),
                frames: vec![vec![0.0; 6]],
            },
            ReportCell {
                gid: 1,
                compartment_counts: vec![1, 1],
                section_order: None,
                frames: vec![vec![0.0; 2]],
            },
        ];
        let mut report = MemoryReport::new(0.0, 0.1, 0.1, "mV", cells).unwrap();
        report.update_mapping(&[1, 2].into_iter().collect()).unwrap();

        assert_eq!(report.frame_size(), 8);
        assert_eq!(report.offsets()[0], vec![0, 1]);
        assert_eq!(report.offsets()[1], vec![2, 6, 8, 3]);
        assert_eq!(report.compartment_counts()[1], vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_report_frames() {
        let cells = vec![ReportCell {
            gid: 1,
            compartment_counts: vec![2],
            section_order: None,
            frames: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        }];
        let mut report = MemoryReport::new(0.0, 1.0, 0.5, "mV", cells).unwrap();
        report.update_mapping(&[1].into_iter().collect()).unwrap();
        assert_eq!(report.load_frame(0.5).unwrap(), vec![3.0, 4.0]);
        assert!(report.load_frame(1.0).is_err());
        assert!(report.load_frame(-1.0).is_err());
        assert!(report.update_mapping(&[9].into_iter().collect()).is_err());
    }

    #[test]
    fn test_report_rejects_bad_frames() {
        let cells = vec![ReportCell {
            gid: 1,
            compartment_counts: vec![2],
            section_order: None,
            frames: vec![vec![1.0]],
        }];
        assert!(matches!(
            MemoryReport::new(0.0, 1.0, 0.5, "mV", cells),
            Err(EmsimError::Scene(_))
        ));
    }

    #[test]
    fn test_report_rejects_cell_without_frames() {
        let cells = vec![ReportCell {
            gid: 1,
            compartment_counts: vec![1],
            section_order: None,
            frames: vec![],
        }];
        assert!(matches!(
            MemoryReport::new(0.0, 1.0, 0.5, "mV", cells),
            Err(EmsimError::Scene(_))
        ));
    }

    #[test]
    fn test_frame_beyond_stored_frames_is_an_error() {
        // end_time promises two frames but only one is stored
        let cells = vec![ReportCell {
            gid: 1,
            compartment_counts: vec![1],
            section_order: None,
            frames: vec![vec![-65.0]],
        }];
        let mut report = MemoryReport::new(0.0, 1.0, 0.5, "mV", cells).unwrap();
        report.update_mapping(&GidSet::from([1])).unwrap();
        assert_eq!(report.load_frame(0.0).unwrap(), vec![-65.0]);
        assert!(matches!(report.load_frame(0.5), Err(EmsimError::Provider(_))));
    }

    #[test]
    fn test_scene_from_json() {
        let json = r#"{
            "circuit": {
                "cells": [{
                    "gid": 4,
                    "morphology": {
                        "soma_centroid": [1.0, 2.0, 3.0],
                        "soma_radius": 4.0,
                        "sections": [[], [[1.0, 2.0, 3.0], [1.0, 12.0, 3.0]]]
                    }
                }]
            },
            "reports": {
                "voltage": {
                    "start_time": 0.0, "end_time": 0.2, "timestep": 0.1, "data_unit": "mV",
                    "cells": [{ "gid": 4, "compartment_counts": [1, 2],
                                "frames": [[-65.0, -64.0, -63.0], [-60.0, -61.0, -62.0]] }]
                }
            }
        }"#;
        let scene = Scene::from_json_str(json).unwrap();
        assert_eq!(scene.circuit.len(), 1);
        let positions = scene.circuit.positions(&[4].into_iter().collect()).unwrap();
        assert_eq!(positions[0], Vec3::new(1.0, 2.0, 3.0));
        let report = scene.report("voltage").unwrap();
        assert_eq!(report.data_unit(), "mV");
        assert!(scene.report("area").is_err());
        assert!(Scene::from_json_str("{").is_err());
    }
}
