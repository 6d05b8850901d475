//! Flattened 2D images produced by reducing a volume along its height axis
//!
//! Images are stored as a flat `Vec<f32>` in row-major order (`z * width + x`),
//! where `x` and `z` are the horizontal volume axes.

use super::Volume;

/// Depth-projected image of a volume
#[derive(Debug, Clone)]
pub struct Image {
    /// Pixel values in row-major order (z * width + x)
    pub data: Vec<f32>,
    /// Image width in pixels (volume x axis)
    pub width: usize,
    /// Image height in pixels (volume z axis)
    pub height: usize,
    /// Physical pixel spacing along (x, z)
    pub spacing: (f32, f32),
}

impl Image {
    /// Create a zeroed image
    ///
    /// # Arguments
    ///
    /// * `width` - Pixels along x
    /// * `height` - Pixels along z
    /// * `spacing` - Physical pixel size along (x, z)
    #[must_use]
    pub fn new(width: usize, height: usize, spacing: (f32, f32)) -> Self {
        Self {
            data: vec![0.0; width * height],
            width,
            height,
            spacing,
        }
    }

    /// Sum the volume over its y axis: `pixel(x, z) = Σ_y volume(x, y, z)`
    #[must_use]
    pub fn project_y(volume: &Volume) -> Self {
        let size = volume.size();
        let spacing = (volume.voxel_size().x, volume.voxel_size().z);
        let mut image = Self::new(size.x, size.z, spacing);
        let data = volume.data();
        let slab = size.x * size.y;

        for z in 0..size.z {
            let row = &mut image.data[z * size.x..(z + 1) * size.x];
            for y in 0..size.y {
                let line = &data[z * slab + y * size.x..z * slab + (y + 1) * size.x];
                for (pixel, &voxel) in row.iter_mut().zip(line) {
                    *pixel += voxel;
                }
            }
        }
        image
    }

    /// Get pixel value
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[must_use]
    pub fn get(&self, x: usize, z: usize) -> f32 {
        assert!(x < self.width && z < self.height, "Coordinates out of bounds");
        self.data[z * self.width + x]
    }

    /// Physical size of the image along (x, z)
    #[must_use]
    pub fn size_in_microns(&self) -> (f32, f32) {
        (
            self.width as f32 * self.spacing.0,
            self.height as f32 * self.spacing.1,
        )
    }

    /// Native-endian bytes of the pixel values
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Aabb, Vec3};

    fn volume(nx: f32, ny: f32, nz: f32) -> Volume {
        let bounds = Aabb::from_corners(Vec3::zeros(), Vec3::new(nx, ny, nz));
        Volume::new(Vec3::repeat(1.0), Vec3::zeros(), &bounds).unwrap()
    }

    #[test]
    fn test_constant_column_sums_to_c_times_height() {
        let mut vol = volume(3.0, 7.0, 2.0);
        let c = 0.75;
        for y in 0..7 {
            let idx = vol.index(2, y, 1);
            vol.data_mut()[idx] = c;
        }
        let image = Image::project_y(&vol);
        assert_eq!(image.width, 3);
        assert_eq!(image.height, 2);
        assert_eq!(image.get(2, 1), c * 7.0);
        assert_eq!(image.get(0, 0), 0.0);
    }

    #[test]
    fn test_projection_keeps_columns_separate() {
        let mut vol = volume(2.0, 2.0, 2.0);
        for (i, v) in vol.data_mut().iter_mut().enumerate() {
            *v = i as f32;
        }
        let image = Image::project_y(&vol);
        // (x, z) = (1, 1): voxels 5 and 7
        assert_eq!(image.get(1, 1), 12.0);
        // (x, z) = (0, 0): voxels 0 and 2
        assert_eq!(image.get(0, 0), 2.0);
        assert_eq!(image.data, vec![2.0, 4.0, 10.0, 12.0]);
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_bounds_check() {
        let image = Image::new(2, 2, (1.0, 1.0));
        let _ = image.get(2, 0);
    }
}
