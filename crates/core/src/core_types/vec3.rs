//! Vector type aliases for positions, voxel sizes and grid dimensions.

use nalgebra::Vector3;

/// 3D vector type for positions, extents and voxel sizes (circuit units, µm).
///
/// This is a simple alias for `nalgebra::Vector3<f32>`, used throughout
/// the crate for compartment positions, bounds and grid geometry.
pub type Vec3 = Vector3<f32>;

/// Integer grid dimensions (voxels per axis).
pub type Dims = Vector3<usize>;
