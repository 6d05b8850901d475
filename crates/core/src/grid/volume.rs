//! Dense regular 3D grid sized from compartment bounds
//!
//! Voxels are stored row-major with x varying fastest, then y, then z:
//! `index = z * (ny * nx) + y * nx + x`.

use crate::core_types::{Aabb, AlignedBuffer, Dims, Vec3};
use crate::error::{EmsimError, Result};
use tracing::info;

/// Regular grid of `f32` voxels covering a bounding box plus padding
#[derive(Debug)]
pub struct Volume {
    voxel_size: Vec3,
    size: Dims,
    origin: Vec3,
    data: AlignedBuffer,
}

impl Volume {
    /// Allocate a zeroed volume around `bounds`
    ///
    /// Each axis holds `round((bounds span + extent) / voxel_size)` voxels
    /// (never negative) and the origin sits at `bounds.min - extent / 2`, so
    /// the padding is shared evenly on both sides.
    ///
    /// # Arguments
    /// * `voxel_size` - Anisotropic voxel size in circuit units
    /// * `extent` - Additional padding added to the bounds on each axis
    /// * `bounds` - Bounding box of the compartments
    ///
    /// # Errors
    /// Returns [`EmsimError::InvalidParameter`] for non-positive voxel sizes
    /// and [`EmsimError::Allocation`] if the voxels cannot be allocated.
    pub fn new(voxel_size: Vec3, extent: Vec3, bounds: &Aabb) -> Result<Self> {
        if voxel_size.iter().any(|&v| v <= 0.0 || !v.is_finite()) {
            return Err(EmsimError::InvalidParameter(format!(
                "voxel size must be positive, got [{} {} {}]",
                voxel_size.x, voxel_size.y, voxel_size.z
            )));
        }

        let span = bounds.size() + extent;
        let size = Dims::from_fn(|axis, _| {
            let voxels = (span[axis] / voxel_size[axis]).round();
            if voxels.is_finite() && voxels > 0.0 {
                voxels as usize
            } else {
                0
            }
        });
        let origin = bounds.min - extent / 2.0;

        let voxel_count = size
            .x
            .checked_mul(size.y)
            .and_then(|xy| xy.checked_mul(size.z))
            .ok_or(EmsimError::Allocation {
                elements: usize::MAX,
            })?;
        let data = AlignedBuffer::zeroed(voxel_count)?;

        info!("Volume size is [{} {} {}]", size.x, size.y, size.z);

        Ok(Self {
            voxel_size,
            size,
            origin,
            data,
        })
    }

    /// Voxels per axis
    pub fn size(&self) -> &Dims {
        &self.size
    }

    /// Minimum corner in circuit units
    pub fn origin(&self) -> &Vec3 {
        &self.origin
    }

    /// Voxel size in circuit units
    pub fn voxel_size(&self) -> &Vec3 {
        &self.voxel_size
    }

    /// Physical size of the grid (`size * voxel_size`)
    pub fn extent_in_microns(&self) -> Vec3 {
        Vec3::new(
            self.size.x as f32 * self.voxel_size.x,
            self.size.y as f32 * self.voxel_size.y,
            self.size.z as f32 * self.voxel_size.z,
        )
    }

    /// Total number of voxels
    pub fn voxel_count(&self) -> usize {
        self.data.len()
    }

    /// Voxel values
    pub fn data(&self) -> &[f32] {
        self.data.as_slice()
    }

    /// Mutable voxel values
    pub fn data_mut(&mut self) -> &mut [f32] {
        self.data.as_mut_slice()
    }

    /// Raw native-endian bytes of the voxel values
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Reset every voxel to `value`
    pub fn clear(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Linear index of voxel `(x, y, z)`
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * (self.size.y * self.size.x) + y * self.size.x + x
    }

    /// Value at voxel `(x, y, z)`, `None` outside the grid
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        if x < self.size.x && y < self.size.y && z < self.size.z {
            Some(self.data()[self.index(x, y, z)])
        } else {
            None
        }
    }

    /// Integer voxel coordinates containing `position`, unbounded
    ///
    /// Uses `floor((position - origin) / voxel_size)` per axis, so points left
    /// of the origin yield negative coordinates.
    pub fn voxel_coordinates(&self, position: &Vec3) -> [i64; 3] {
        let local = (position - self.origin).component_div(&self.voxel_size);
        [
            local.x.floor() as i64,
            local.y.floor() as i64,
            local.z.floor() as i64,
        ]
    }

    /// Linear index of the voxel containing `position`, `None` outside the grid
    pub fn voxel_index(&self, position: &Vec3) -> Option<usize> {
        let coords = self.voxel_coordinates(position);
        let mut voxel = [0usize; 3];
        for axis in 0..3 {
            let c = coords[axis];
            if c < 0 || c as u64 >= self.size[axis] as u64 {
                return None;
            }
            voxel[axis] = c as usize;
        }
        Some(self.index(voxel[0], voxel[1], voxel[2]))
    }

    /// Position of the minimum corner of voxel `(x, y, z)`
    pub fn voxel_corner(&self, x: usize, y: usize, z: usize) -> Vec3 {
        self.origin
            + Vec3::new(x as f32, y as f32, z as f32).component_mul(&self.voxel_size)
    }
}
