//! Compartment currents as point sources, one frame at a time

use crate::core_types::{Aabb, TimeRangeRequest, Timeline, Vec3};
use crate::error::{EmsimError, Result};
use crate::geometry::{load_compartment_geometry, Events};
use crate::provider::{CircuitProvider, GidSet, ReportProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters of a field run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LfpParams {
    /// Cell target, empty for every cell
    pub target: String,
    /// Name of the current report
    pub report: String,
    /// Requested time range
    pub time_range: TimeRangeRequest,
    /// Fraction of the target to load, in `[0, 1]`
    pub fraction: f32,
    /// Voxel size of the exported volume
    pub voxel_size: Vec3,
    /// Padding added around the circuit bounds
    pub extent: Vec3,
    /// Write the volume of every frame
    pub export_volume: bool,
    /// Probe positions for time series output
    pub sample_points: Vec<Vec3>,
    /// Morphologies held at once while loading geometry
    pub cells_per_batch: usize,
}

impl Default for LfpParams {
    fn default() -> Self {
        Self {
            target: String::new(),
            report: "currents".to_string(),
            time_range: TimeRangeRequest::full(),
            fraction: 1.0,
            voxel_size: Vec3::repeat(4.0),
            extent: Vec3::zeros(),
            export_volume: false,
            sample_points: Vec::new(),
            cells_per_batch: 1000,
        }
    }
}

/// Streams report frames into the powers of a fixed set of events
pub struct EventsLoader {
    report: Box<dyn ReportProvider>,
    gids: GidSet,
    events: Events,
    bounds: Aabb,
    timeline: Timeline,
    current_frame: usize,
}

impl EventsLoader {
    /// Select cells, resolve the time range and load the event geometry
    ///
    /// # Arguments
    /// * `params` - Target, time range, fraction and batch size
    /// * `circuit` - Source of ids and morphologies
    /// * `report` - Current report; frames are read from it on demand
    ///
    /// # Errors
    /// Fails on an empty selection, an invalid time range or any provider
    /// failure while loading geometry.
    pub fn new(
        params: &LfpParams,
        circuit: &dyn CircuitProvider,
        mut report: Box<dyn ReportProvider>,
    ) -> Result<Self> {
        let gids = circuit.select_gids(&params.target, params.fraction)?;
        let Some(&first) = gids.first() else {
            return Err(EmsimError::InvalidParameter(format!(
                "target '{}' selects no cells",
                params.target
            )));
        };
        info!("Selected {} cells", gids.len());

        let timeline = Timeline::resolve(
            params.time_range,
            report.start_time(),
            report.end_time(),
            report.timestep(),
        )?;

        log_current_balance(report.as_mut(), first, &timeline)?;

        let geometry =
            load_compartment_geometry(circuit, report.as_mut(), &gids, params.cells_per_batch)?;
        let mut events = Events::new(geometry.len())?;
        for (position, &radius) in geometry.positions.iter().zip(&geometry.radii) {
            events.add_event(position, radius)?;
        }

        Ok(Self {
            report,
            gids,
            events,
            bounds: geometry.bounds,
            timeline,
            current_frame: 0,
        })
    }

    /// Copy the next report frame into the event powers
    ///
    /// # Errors
    /// Fails once every frame of the time range has been loaded, or if the
    /// report returns a frame of the wrong size.
    pub fn load_next_frame(&mut self) -> Result<&Events> {
        if self.current_frame >= self.timeline.frames_count() {
            return Err(EmsimError::InvalidParameter(format!(
                "all {} frames are already loaded",
                self.timeline.frames_count()
            )));
        }
        let time = self.timeline.time_of(self.current_frame);
        let values = self.report.load_frame(time)?;
        if values.len() != self.events.len() {
            return Err(EmsimError::Provider(format!(
                "frame at {time} holds {} values, expected {}",
                values.len(),
                self.events.len()
            )));
        }
        self.events.powers_mut().copy_from_slice(&values);
        self.current_frame += 1;
        debug!("Loaded frame at t={}", time);
        Ok(&self.events)
    }

    /// Events of the most recently loaded frame
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Number of frames in the time range
    pub fn frames_count(&self) -> usize {
        self.timeline.frames_count()
    }

    /// Number of frames loaded so far
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Resolved time axis
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Unit of the report values
    pub fn data_unit(&self) -> &str {
        self.report.data_unit()
    }

    /// Bounds of every event widened by its radius
    pub fn circuit_bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Loaded cell ids
    pub fn gids(&self) -> &GidSet {
        &self.gids
    }
}

/// Log `Σv / Σ|v|` over the compartments of one cell at mid-range
///
/// A well-formed transmembrane current report sums to roughly zero per cell.
fn log_current_balance(
    report: &mut dyn ReportProvider,
    gid: u32,
    timeline: &Timeline,
) -> Result<()> {
    report.update_mapping(&GidSet::from([gid]))?;
    let values = report.load_frame((timeline.start() + timeline.end()) / 2.0)?;
    let (sum, abs_sum) = values
        .iter()
        .fold((0.0f32, 0.0f32), |(s, a), &v| (s + v, a + v.abs()));
    info!("Normalized current sum: {}", sum / abs_sum);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::{CellRecord, ReportCell};
    use crate::provider::{MemoryCircuit, MemoryReport, PolylineMorphology};
    use rustc_hash::FxHashMap;

    fn soma_cell(gid: u32, x: f32) -> CellRecord {
        CellRecord {
            gid,
            position: None,
            morphology: PolylineMorphology {
                soma_centroid: Vec3::new(x, 0.0, 0.0),
                soma_radius: 0.25,
                sections: vec![vec![]],
            },
        }
    }

    fn scene() -> (MemoryCircuit, MemoryReport) {
        let circuit = MemoryCircuit::new(
            vec![soma_cell(1, -0.5), soma_cell(2, 0.5)],
            FxHashMap::default(),
            0,
        )
        .unwrap();
        let cells = vec![
            ReportCell {
                gid: 1,
                compartment_counts: vec![1],
                section_order: None,
                frames: vec![vec![1.0], vec![2.0], vec![3.0]],
            },
            ReportCell {
                gid: 2,
                compartment_counts: vec![1],
                section_order: None,
                frames: vec![vec![-1.0], vec![-2.0], vec![-3.0]],
            },
        ];
        let report = MemoryReport::new(0.0, 3.0, 1.0, "nA", cells).unwrap();
        (circuit, report)
    }

    #[test]
    fn test_frames_are_streamed_into_powers() {
        let (circuit, report) = scene();
        let mut loader =
            EventsLoader::new(&LfpParams::default(), &circuit, Box::new(report)).unwrap();

        assert_eq!(loader.frames_count(), 3);
        assert_eq!(loader.events().len(), 2);
        assert_eq!(loader.events().position(0), Vec3::new(-0.5, 0.0, 0.0));
        assert_eq!(loader.data_unit(), "nA");

        assert_eq!(loader.load_next_frame().unwrap().powers(), &[1.0, -1.0]);
        assert_eq!(loader.load_next_frame().unwrap().powers(), &[2.0, -2.0]);
        assert_eq!(loader.load_next_frame().unwrap().powers(), &[3.0, -3.0]);
        assert!(loader.load_next_frame().is_err());
    }

    #[test]
    fn test_bounds_include_soma_radius() {
        let (circuit, report) = scene();
        let loader =
            EventsLoader::new(&LfpParams::default(), &circuit, Box::new(report)).unwrap();
        assert_eq!(loader.circuit_bounds().min, Vec3::new(-0.75, -0.25, -0.25));
        assert_eq!(loader.circuit_bounds().max, Vec3::new(0.75, 0.25, 0.25));
    }

    #[test]
    fn test_invalid_time_range() {
        let (circuit, report) = scene();
        let params = LfpParams {
            time_range: TimeRangeRequest::new(1.5, 1.0),
            ..LfpParams::default()
        };
        assert!(matches!(
            EventsLoader::new(&params, &circuit, Box::new(report)),
            Err(EmsimError::InvalidTimeRange { .. })
        ));
    }
}
