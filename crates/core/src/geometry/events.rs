//! Point sources for the field pipeline
//!
//! Geometry (position, radius) is fixed for the whole run; powers are
//! overwritten every frame.

use crate::core_types::{AlignedBuffer, Vec3};
use crate::error::{EmsimError, Result};

/// Fixed-capacity set of point sources with per-frame powers
#[derive(Debug)]
pub struct Events {
    flat_positions: AlignedBuffer,
    radii: AlignedBuffer,
    powers: AlignedBuffer,
    next: usize,
}

impl Events {
    /// Allocate room for `count` events, all values zeroed
    ///
    /// # Errors
    /// Returns [`EmsimError::Allocation`] if the buffers cannot be reserved.
    pub fn new(count: usize) -> Result<Self> {
        let position_count = count
            .checked_mul(3)
            .ok_or(EmsimError::Allocation { elements: usize::MAX })?;
        Ok(Self {
            flat_positions: AlignedBuffer::zeroed(position_count)?,
            radii: AlignedBuffer::zeroed(count)?,
            powers: AlignedBuffer::zeroed(count)?,
            next: 0,
        })
    }

    /// Store the geometry of the next event
    ///
    /// # Errors
    /// Returns [`EmsimError::InvalidParameter`] once every slot is filled.
    pub fn add_event(&mut self, position: &Vec3, radius: f32) -> Result<()> {
        if self.next >= self.len() {
            return Err(EmsimError::InvalidParameter(
                "cannot add event, maximum number of events reached".to_string(),
            ));
        }
        let i = self.next;
        self.flat_positions.as_mut_slice()[i * 3..i * 3 + 3]
            .copy_from_slice(position.as_slice());
        self.radii.as_mut_slice()[i] = radius;
        self.next += 1;
        Ok(())
    }

    /// Number of event slots
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    /// True if there are no event slots
    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    /// Number of events whose geometry has been added
    pub fn added(&self) -> usize {
        self.next
    }

    /// Positions as interleaved `x, y, z` triples
    pub fn flat_positions(&self) -> &[f32] {
        self.flat_positions.as_slice()
    }

    /// Position of event `i`
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::from_column_slice(&self.flat_positions()[i * 3..i * 3 + 3])
    }

    /// Event radii
    pub fn radii(&self) -> &[f32] {
        self.radii.as_slice()
    }

    /// Event powers of the current frame
    pub fn powers(&self) -> &[f32] {
        self.powers.as_slice()
    }

    /// Mutable event powers
    pub fn powers_mut(&mut self) -> &mut [f32] {
        self.powers.as_mut_slice()
    }
}
