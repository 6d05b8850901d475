//! Extracellular field ("LFP") pipeline
//!
//! Compartment currents act as point sources. Their field is evaluated on a
//! regular volume through a pluggable [`FieldKernel`] and at a handful of
//! probe positions through [`SamplePoints`].

pub mod kernel;
pub mod loader;
pub mod sample_points;

pub use kernel::{FieldKernel, PointSourceKernel, EXTRACELLULAR_RESISTIVITY};
pub use loader::{EventsLoader, LfpParams};
pub use sample_points::SamplePoints;
