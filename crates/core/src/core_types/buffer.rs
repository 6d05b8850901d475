//! Owned, aligned `f32` storage for volumes, events and probe tables
//!
//! Storage is a vector of 32-byte aligned lanes of eight floats, so the first
//! element is always 32-byte aligned and SIMD kernels can load full lanes.
//! The logical length may be shorter than the lane capacity; the tail of the
//! last lane is kept at zero and is never exposed.

use crate::error::{EmsimError, Result};
use bytemuck::{Pod, Zeroable};

/// Alignment in bytes of every [`AlignedBuffer`] allocation
pub const ALIGNMENT: usize = 32;

const LANE_WIDTH: usize = ALIGNMENT / std::mem::size_of::<f32>();

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, align(32))]
struct Lane([f32; LANE_WIDTH]);

/// Zero-initialised, 32-byte aligned, exclusively owned float buffer
///
/// Not `Clone`: buffers move between pipeline stages.
#[derive(Debug)]
pub struct AlignedBuffer {
    lanes: Vec<Lane>,
    len: usize,
}

impl AlignedBuffer {
    /// Allocate `len` zeroed floats
    ///
    /// # Errors
    /// Returns [`EmsimError::Allocation`] if the memory cannot be reserved.
    pub fn zeroed(len: usize) -> Result<Self> {
        let lane_count = len.div_ceil(LANE_WIDTH);
        let mut lanes = Vec::new();
        lanes
            .try_reserve_exact(lane_count)
            .map_err(|_| EmsimError::Allocation { elements: len })?;
        lanes.resize(lane_count, Lane::zeroed());
        Ok(Self { lanes, len })
    }

    /// Number of logical elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements as a slice
    pub fn as_slice(&self) -> &[f32] {
        &bytemuck::cast_slice::<Lane, f32>(&self.lanes)[..self.len]
    }

    /// Elements as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut bytemuck::cast_slice_mut::<Lane, f32>(&mut self.lanes)[..self.len]
    }

    /// Native-endian bytes of the logical elements (for raw dumps)
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    /// Set every element to `value`
    pub fn fill(&mut self, value: f32) {
        self.as_mut_slice().fill(value);
    }
}
