//! Contracts for the external circuit and report sources
//!
//! The projection core never reads circuits or reports itself. It consumes
//! them through [`CircuitProvider`] and [`ReportProvider`]; [`memory`] holds
//! in-memory implementations backed by a JSON scene.

pub mod memory;

use crate::core_types::Vec3;
use crate::error::Result;
use std::collections::BTreeSet;
use std::sync::Arc;

pub use memory::{MemoryCircuit, MemoryReport, PolylineMorphology, Scene};

/// Opaque identifier of one simulated cell
pub type Gid = u32;

/// Ordered set of cell identifiers
pub type GidSet = BTreeSet<Gid>;

/// Section id used for the soma
pub const SOMA_SECTION: u32 = 0;

/// Geometry of one neuron in global circuit coordinates
pub trait Morphology: Send + Sync {
    /// Soma center
    fn soma_centroid(&self) -> Vec3;

    /// Mean soma radius
    fn soma_mean_radius(&self) -> f32;

    /// Arc length of a non-soma section
    ///
    /// # Errors
    /// Fails if the section does not exist.
    fn section_length(&self, section: u32) -> Result<f32>;

    /// Points along a section at normalized arc-length parameters in `[0, 1]`
    ///
    /// # Errors
    /// Fails if the section does not exist.
    fn section_samples(&self, section: u32, params: &[f32]) -> Result<Vec<Vec3>>;
}

/// Source of cell identifiers and morphologies
pub trait CircuitProvider {
    /// Cells of `target` (all cells when empty), randomly subsampled to `fraction`
    ///
    /// # Errors
    /// Fails for unknown targets or a fraction outside `[0, 1]`.
    fn select_gids(&self, target: &str, fraction: f32) -> Result<GidSet>;

    /// Morphologies of `gids`, in ascending id order
    ///
    /// # Errors
    /// Fails if any id is unknown.
    fn load_morphologies(&self, gids: &GidSet) -> Result<Vec<Arc<dyn Morphology>>>;

    /// Reference (soma) position of each cell, in ascending id order
    ///
    /// # Errors
    /// Fails if any id is unknown.
    fn positions(&self, gids: &GidSet) -> Result<Vec<Vec3>>;
}

/// Source of per-compartment time series
///
/// The flat frame buffer is laid out by increasing offset over the cells of
/// the current mapping. `offsets()[i][s]` and `compartment_counts()[i][s]`
/// describe section `s` of the `i`-th mapped cell.
pub trait ReportProvider {
    /// First time stored in the report (ms)
    fn start_time(&self) -> f32;

    /// End time of the report (ms), exclusive
    fn end_time(&self) -> f32;

    /// Native time step of the report (ms)
    fn timestep(&self) -> f32;

    /// Unit of the stored values, e.g. "mV" or "nA"
    fn data_unit(&self) -> &str;

    /// Restrict the mapping and frame layout to `gids`
    ///
    /// # Errors
    /// Fails if any id is missing from the report.
    fn update_mapping(&mut self, gids: &GidSet) -> Result<()>;

    /// Buffer offset per mapped cell and section
    fn offsets(&self) -> &[Vec<u64>];

    /// Compartment count per mapped cell and section
    fn compartment_counts(&self) -> &[Vec<u16>];

    /// Number of values in one frame of the current mapping
    fn frame_size(&self) -> usize;

    /// Values of the frame at `time` for the current mapping
    ///
    /// # Errors
    /// Fails if `time` lies outside the report.
    fn load_frame(&self, time: f32) -> Result<Vec<f32>>;
}
