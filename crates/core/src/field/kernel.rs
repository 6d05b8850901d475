//! Bulk aggregation of point-source fields onto a volume
//!
//! The kernel is a strategy: the pipeline only relies on the contract that
//! [`FieldKernel::compute`] overwrites every voxel from the current event
//! powers. [`PointSourceKernel`] is the homogeneous-medium implementation.

use crate::core_types::Vec3;
use crate::geometry::Events;
use crate::grid::Volume;
use rayon::prelude::*;
use std::f32::consts::PI;

/// Extracellular resistivity of the tissue (Ω·m)
pub const EXTRACELLULAR_RESISTIVITY: f32 = 3.54;

/// Strategy turning the current frame of events into voxel values
pub trait FieldKernel: Send + Sync {
    /// Overwrite every voxel of `volume` with the field produced by `events`
    fn compute(&self, events: &Events, volume: &mut Volume);
}

/// Point-source field in a homogeneous resistive medium
///
/// `field(p) = coefficient * Σ power_e / max(|p - pos_e|, radius_e)`, with the
/// distance floored at the event radius so the field stays finite inside a
/// compartment. Voxels are evaluated at their minimum corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSourceKernel {
    coefficient: f32,
}

impl PointSourceKernel {
    /// Kernel for a medium of the given resistivity (Ω·m)
    pub fn with_resistivity(resistivity: f32) -> Self {
        Self {
            coefficient: resistivity / (4.0 * PI),
        }
    }

    /// Scale applied to `power / distance`
    pub fn coefficient(&self) -> f32 {
        self.coefficient
    }

    /// Field at `point` from every event of the current frame
    pub fn field_at(&self, point: &Vec3, events: &Events) -> f32 {
        let positions = events.flat_positions();
        let sum: f32 = events
            .radii()
            .iter()
            .zip(events.powers())
            .enumerate()
            .map(|(i, (&radius, &power))| {
                let dx = point.x - positions[i * 3];
                let dy = point.y - positions[i * 3 + 1];
                let dz = point.z - positions[i * 3 + 2];
                let distance = (dx * dx + dy * dy + dz * dz).sqrt();
                power / distance.max(radius)
            })
            .sum();
        self.coefficient * sum
    }
}

impl Default for PointSourceKernel {
    fn default() -> Self {
        Self::with_resistivity(EXTRACELLULAR_RESISTIVITY)
    }
}

impl FieldKernel for PointSourceKernel {
    fn compute(&self, events: &Events, volume: &mut Volume) {
        let size = *volume.size();
        let origin = *volume.origin();
        let voxel_size = *volume.voxel_size();
        let slab = size.x * size.y;
        if slab == 0 {
            return;
        }

        volume
            .data_mut()
            .par_chunks_mut(slab)
            .enumerate()
            .for_each(|(z, slice)| {
                let pz = origin.z + z as f32 * voxel_size.z;
                for y in 0..size.y {
                    let py = origin.y + y as f32 * voxel_size.y;
                    for x in 0..size.x {
                        let point = Vec3::new(origin.x + x as f32 * voxel_size.x, py, pz);
                        slice[y * size.x + x] = self.field_at(&point, events);
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Aabb;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_coefficient() {
        let kernel = PointSourceKernel::default();
        assert_relative_eq!(kernel.coefficient(), 0.281_704_2, max_relative = 1e-5);
    }

    #[test]
    fn test_distance_floored_at_radius() {
        let mut events = Events::new(1).unwrap();
        events.add_event(&Vec3::zeros(), 2.0).unwrap();
        events.powers_mut()[0] = 4.0;
        let kernel = PointSourceKernel::with_resistivity(4.0 * PI);

        assert_relative_eq!(kernel.field_at(&Vec3::zeros(), &events), 2.0);
        assert_relative_eq!(kernel.field_at(&Vec3::new(1.0, 0.0, 0.0), &events), 2.0);
        assert_relative_eq!(kernel.field_at(&Vec3::new(0.0, 8.0, 0.0), &events), 0.5);
    }

    #[test]
    fn test_compute_overwrites_every_voxel() {
        let bounds = Aabb::from_corners(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0));
        let mut volume = Volume::new(Vec3::repeat(1.0), Vec3::zeros(), &bounds).unwrap();
        volume.clear(100.0);

        let mut events = Events::new(1).unwrap();
        events.add_event(&Vec3::zeros(), 1.0).unwrap();
        events.powers_mut()[0] = 1.0;
        let kernel = PointSourceKernel::with_resistivity(4.0 * PI);
        kernel.compute(&events, &mut volume);

        assert_relative_eq!(volume.get(0, 0, 0).unwrap(), 1.0);
        assert_relative_eq!(volume.get(1, 1, 1).unwrap(), 1.0 / 3f32.sqrt());
        assert_relative_eq!(volume.get(1, 0, 1).unwrap(), 1.0 / 2f32.sqrt());
    }
}
