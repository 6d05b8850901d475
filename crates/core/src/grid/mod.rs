//! Regular output grids: the 3D volume and its 2D depth projection

pub mod image;
pub mod volume;

// Re-export main types
pub use image::Image;
pub use volume::Volume;
