//! EMSim Core Library
//!
//! Projects the per-compartment signals of a simulated neural circuit onto
//! regular grids, one simulation frame at a time.
//!
//! ## Pipelines
//!
//! - **VSD**: membrane voltages are weighted by compartment area, Beer–Lambert
//!   absorption and a dye response curve, binned into a sensor volume and
//!   summed along depth into a 2D image.
//! - **Field (LFP)**: transmembrane currents act as point sources whose
//!   extracellular potential is evaluated on a volume and at probe positions.
//!
//! Both pipelines share the bounding box, the volume, the batched geometry
//! loader and the time axis. Circuits and reports are consumed through the
//! [`provider`] traits.

// Core types and utilities
pub mod core_types;
pub mod error;

// Numerical building blocks
pub mod attenuation;
pub mod geometry;
pub mod grid;

// Data sources
pub mod provider;

// Pipelines and output
pub mod export;
pub mod field;
pub mod vsd;

// Re-export core types
pub use core_types::{Aabb, AlignedBuffer, Dims, TimeRangeRequest, Timeline, Vec3};
pub use error::{EmsimError, Result};

// Re-export pipeline types
pub use attenuation::AttenuationCurve;
pub use field::{EventsLoader, FieldKernel, LfpParams, PointSourceKernel, SamplePoints};
pub use geometry::Events;
pub use grid::{Image, Volume};
pub use provider::{CircuitProvider, ReportProvider, Scene};
pub use vsd::{VsdLoader, VsdParams};
