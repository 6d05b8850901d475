//! Voltage-sensitive dye imaging pipeline
//!
//! Compartment voltages are binned into a sensor volume with static weights
//! combining membrane area, Beer–Lambert absorption and the dye response
//! curve, then summed along the depth axis into a sensor image with
//! [`crate::grid::Image::project_y`].

pub mod loader;
pub mod params;
pub mod weighting;

pub use loader::{SomaPixel, VsdLoader};
pub use params::VsdParams;
pub use weighting::{
    accumulate_frame, compute_links, DepthAttenuation, LinkWeighting, SignalTransform,
    WeightedLink,
};
