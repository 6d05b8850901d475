//! Field time series at fixed probe positions
//!
//! Values are stored time-major: `values[frame * probes + probe]`.

use super::kernel::PointSourceKernel;
use crate::core_types::{AlignedBuffer, Vec3};
use crate::error::{EmsimError, Result};
use crate::geometry::Events;

/// Probe values are reported in µV, the kernel works in mV
const MICROVOLTS_PER_MILLIVOLT: f32 = 1000.0;

/// Probe positions and their value for every frame
#[derive(Debug)]
pub struct SamplePoints {
    positions: Vec<Vec3>,
    values: AlignedBuffer,
    frames: usize,
    computed: usize,
    kernel: PointSourceKernel,
}

impl SamplePoints {
    /// Allocate a zeroed value table for `frames` frames of `positions`
    ///
    /// # Errors
    /// Returns [`EmsimError::Allocation`] if the table cannot be allocated.
    pub fn new(frames: usize, positions: Vec<Vec3>) -> Result<Self> {
        Self::with_kernel(frames, positions, PointSourceKernel::default())
    }

    /// Same as [`SamplePoints::new`] with an explicit kernel
    ///
    /// # Errors
    /// Returns [`EmsimError::Allocation`] if the table cannot be allocated.
    pub fn with_kernel(
        frames: usize,
        positions: Vec<Vec3>,
        kernel: PointSourceKernel,
    ) -> Result<Self> {
        let count = frames
            .checked_mul(positions.len())
            .ok_or(EmsimError::Allocation { elements: usize::MAX })?;
        Ok(Self {
            values: AlignedBuffer::zeroed(count)?,
            positions,
            frames,
            computed: 0,
            kernel,
        })
    }

    /// Evaluate every probe for the next frame
    ///
    /// # Errors
    /// Returns [`EmsimError::InvalidParameter`] once every frame is filled.
    pub fn compute_next_frame(&mut self, events: &Events) -> Result<()> {
        if self.computed >= self.frames {
            return Err(EmsimError::InvalidParameter(format!(
                "all {} sample point frames are already computed",
                self.frames
            )));
        }
        let probes = self.positions.len();
        let start = self.computed * probes;
        let row = &mut self.values.as_mut_slice()[start..start + probes];
        for (value, position) in row.iter_mut().zip(&self.positions) {
            *value = MICROVOLTS_PER_MILLIVOLT * self.kernel.field_at(position, events);
        }
        self.computed += 1;
        Ok(())
    }

    /// Probe positions
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Number of frames in the table
    pub fn frames_count(&self) -> usize {
        self.frames
    }

    /// Number of frames computed so far
    pub fn computed_frames(&self) -> usize {
        self.computed
    }

    /// Whole time-major value table
    pub fn values(&self) -> &[f32] {
        self.values.as_slice()
    }

    /// Value of `probe` at `frame`
    pub fn value(&self, frame: usize, probe: usize) -> f32 {
        self.values()[frame * self.positions.len() + probe]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        let mut events = Events::new(1).unwrap();
        events.add_event(&Vec3::zeros(), 1.0).unwrap();

        let mut samples =
            SamplePoints::new(2, vec![Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)]).unwrap();
        assert_eq!(samples.values().len(), 4);

        events.powers_mut()[0] = 0.0;
        samples.compute_next_frame(&events).unwrap();
        events.powers_mut()[0] = 1.0;
        samples.compute_next_frame(&events).unwrap();

        assert_eq!(samples.value(0, 0), 0.0);
        assert_eq!(samples.value(0, 1), 0.0);
        let near = samples.value(1, 0);
        let far = samples.value(1, 1);
        assert!((near - 2.0 * far).abs() < 1e-3 * near.abs());
        assert!(samples.compute_next_frame(&events).is_err());
    }
}
