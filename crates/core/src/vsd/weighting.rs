//! Static compartment-to-voxel links and per-frame accumulation

use crate::attenuation::AttenuationCurve;
use crate::core_types::Vec3;
use crate::grid::Volume;
use rayon::prelude::*;

/// Target voxel and weight of one compartment slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedLink {
    /// Static weight applied to the transformed signal
    pub weight: f32,
    /// Linear voxel index, [`WeightedLink::DROPPED`] outside the volume
    pub voxel_index: i64,
}

impl WeightedLink {
    /// Voxel index of a compartment that falls outside the volume
    pub const DROPPED: i64 = -1;

    /// Link that never contributes
    pub fn dropped() -> Self {
        Self {
            weight: 0.0,
            voxel_index: Self::DROPPED,
        }
    }

    /// True if the compartment lies outside the volume
    pub fn is_dropped(&self) -> bool {
        self.voxel_index == Self::DROPPED
    }
}

/// Static weight of a compartment given its buffer slot and position
pub trait LinkWeighting: Sync {
    /// Weight of the compartment at flat slot `slot`
    fn weight(&self, slot: usize, position: &Vec3) -> f32;
}

/// `area · exp(-sigma · (depth - y)) · attenuation(y)`
///
/// The exponential is the Beer–Lambert loss between the compartment and the
/// surface at `depth`; the curve models the dye response at that depth.
#[derive(Debug, Clone, Copy)]
pub struct DepthAttenuation<'a> {
    /// Membrane area per compartment slot
    pub areas: &'a [f32],
    /// Absorption plus scattering coefficient
    pub sigma: f32,
    /// Surface position along y
    pub depth: f32,
    /// Dye response curve
    pub curve: &'a AttenuationCurve,
    /// Interpolate between curve samples
    pub interpolate: bool,
}

impl LinkWeighting for DepthAttenuation<'_> {
    fn weight(&self, slot: usize, position: &Vec3) -> f32 {
        self.areas[slot]
            * (-self.sigma * (self.depth - position.y)).exp()
            * self.curve.attenuation(position.y, self.interpolate)
    }
}

/// Link every compartment position to its voxel
///
/// Compartments outside `volume` are dropped and never weighted.
pub fn compute_links(
    positions: &[Vec3],
    volume: &Volume,
    weighting: &dyn LinkWeighting,
) -> Vec<WeightedLink> {
    positions
        .par_iter()
        .enumerate()
        .map(|(slot, position)| match volume.voxel_index(position) {
            Some(index) => WeightedLink {
                weight: weighting.weight(slot, position),
                voxel_index: index as i64,
            },
            None => WeightedLink::dropped(),
        })
        .collect()
}

/// Voltage to fluorescence: `min(v, ap_threshold) - v0 + g0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalTransform {
    /// Upper clamp applied to the raw voltage
    pub ap_threshold: f32,
    /// Resting potential subtracted from the voltage
    pub v0: f32,
    /// Fluorescence offset
    pub g0: f32,
}

impl SignalTransform {
    /// Transformed signal of one raw value
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        value.min(self.ap_threshold) - self.v0 + self.g0
    }
}

/// Scatter-add the weighted, transformed `values` into `volume`
///
/// Does not clear the volume. `values` and `links` are indexed by the same
/// flat compartment slot. Dropped links and links whose voxel index lies
/// outside the volume are skipped.
pub fn accumulate_frame(
    volume: &mut Volume,
    links: &[WeightedLink],
    values: &[f32],
    transform: &SignalTransform,
) {
    let data = volume.data_mut();
    for (link, &value) in links.iter().zip(values) {
        let Some(voxel) = usize::try_from(link.voxel_index)
            .ok()
            .and_then(|index| data.get_mut(index))
        else {
            continue;
        };
        *voxel += transform.apply(value) * link.weight;
    }
}
