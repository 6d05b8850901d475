//! Batched construction of per-compartment sample positions
//!
//! Morphologies are loaded a fixed number of cells at a time to bound peak
//! memory. Each batch is mapped, walked in buffer order and folded into the
//! shared geometry before the next batch is loaded.

use super::mapping::{compute_inverse_mapping, MappingElement};
use crate::core_types::{Aabb, Vec3};
use crate::error::{EmsimError, Result};
use crate::provider::{CircuitProvider, GidSet, Morphology, ReportProvider, SOMA_SECTION};
use std::sync::Arc;
use tracing::{debug, info};

/// Compartment radius as a fraction of the compartment length
const RADIUS_PER_LENGTH: f32 = 0.2;

/// Sample position and radius of every compartment, in frame buffer order
#[derive(Debug, Clone, Default)]
pub struct CompartmentGeometry {
    /// Sample position per compartment
    pub positions: Vec<Vec3>,
    /// Approximate radius per compartment
    pub radii: Vec<f32>,
    /// Bounds of all samples widened by their radii
    pub bounds: Aabb,
}

impl CompartmentGeometry {
    /// Empty geometry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compartments
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if no compartment was added
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append the compartments of one mapped batch
    ///
    /// Soma runs replicate the soma centroid and mean radius. Other sections
    /// are cut into equal compartments sampled at their midpoints, with a
    /// radius of a fifth of the compartment length.
    ///
    /// # Arguments
    /// * `mapping` - Runs of the batch sorted by buffer offset
    /// * `morphologies` - Morphologies of the batch, indexed by `cell_index`
    ///
    /// # Errors
    /// Fails if a run names a missing cell or section, or if the morphology
    /// returns the wrong number of samples.
    pub fn append(
        &mut self,
        mapping: &[MappingElement],
        morphologies: &[Arc<dyn Morphology>],
    ) -> Result<()> {
        for run in mapping {
            let morphology = morphologies.get(run.cell_index as usize).ok_or_else(|| {
                EmsimError::Provider(format!(
                    "mapping names cell index {} but only {} morphologies are loaded",
                    run.cell_index,
                    morphologies.len()
                ))
            })?;
            let compartments = usize::from(run.compartments);

            if run.section_id == SOMA_SECTION {
                let centroid = morphology.soma_centroid();
                let radius = morphology.soma_mean_radius();
                self.bounds.add(&centroid, radius);
                self.positions.extend(std::iter::repeat_n(centroid, compartments));
                self.radii.extend(std::iter::repeat_n(radius, compartments));
                continue;
            }

            let normalized_length = 1.0 / compartments as f32;
            let params: Vec<f32> = (0..compartments)
                .map(|k| (k as f32 + 0.5) * normalized_length)
                .collect();
            let compartment_length =
                normalized_length * morphology.section_length(run.section_id)?;
            let radius = compartment_length * RADIUS_PER_LENGTH;

            let points = morphology.section_samples(run.section_id, &params)?;
            if points.len() != compartments {
                return Err(EmsimError::Provider(format!(
                    "section {} returned {} samples for {} compartments",
                    run.section_id,
                    points.len(),
                    compartments
                )));
            }

            for point in points {
                self.bounds.add(&point, radius);
                self.positions.push(point);
                self.radii.push(radius);
            }
        }
        Ok(())
    }
}

/// Sample every compartment of `gids`, loading morphologies in batches
///
/// On return the report mapping covers all of `gids` again, and the geometry
/// holds exactly one entry per value of a frame.
///
/// # Arguments
/// * `circuit` - Source of morphologies
/// * `report` - Report whose layout defines the compartment order
/// * `gids` - Cells to load
/// * `cells_per_batch` - Maximum number of morphologies held at once
///
/// # Errors
/// Propagates provider failures, and fails if the sampled geometry does not
/// match the report frame size.
pub fn load_compartment_geometry(
    circuit: &dyn CircuitProvider,
    report: &mut dyn ReportProvider,
    gids: &GidSet,
    cells_per_batch: usize,
) -> Result<CompartmentGeometry> {
    if cells_per_batch == 0 {
        return Err(EmsimError::InvalidParameter(
            "cells per batch must be positive".to_string(),
        ));
    }

    report.update_mapping(gids)?;
    let frame_size = report.frame_size();
    info!("Loading {} compartments...", frame_size);

    let mut geometry = CompartmentGeometry {
        positions: Vec::with_capacity(frame_size),
        radii: Vec::with_capacity(frame_size),
        bounds: Aabb::empty(),
    };

    let ordered: Vec<_> = gids.iter().copied().collect();
    for (batch_index, batch) in ordered.chunks(cells_per_batch).enumerate() {
        let batch: GidSet = batch.iter().copied().collect();
        let morphologies = circuit.load_morphologies(&batch)?;
        report.update_mapping(&batch)?;
        let mapping = compute_inverse_mapping(report.offsets(), report.compartment_counts());
        geometry.append(&mapping, &morphologies)?;
        debug!(
            "Batch {} done: {} cells, {} compartments so far",
            batch_index,
            batch.len(),
            geometry.len()
        );
    }

    report.update_mapping(gids)?;
    if geometry.len() != frame_size {
        return Err(EmsimError::Provider(format!(
            "sampled {} compartments but the report frame holds {}",
            geometry.len(),
            frame_size
        )));
    }

    info!("Circuit AABB: {}", geometry.bounds);
    Ok(geometry)
}
