//! Configuration of a VSD run

use crate::core_types::TimeRangeRequest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters of a VSD run
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VsdParams {
    /// Cell target, empty for every cell
    pub target: String,
    /// Name of the membrane voltage report
    pub voltage_report: String,
    /// Name of the compartment area report
    pub area_report: String,
    /// Dye attenuation curve, one value per line
    pub curve_file: Option<PathBuf>,
    /// Side of the square sensor (µm)
    pub sensor_dim: f32,
    /// Sensor pixels per side
    pub sensor_res: usize,
    /// Depth of the cortical surface along y (µm)
    pub depth: f32,
    /// Absorption plus scattering coefficient (1/µm)
    pub sigma: f32,
    /// Fluorescence at rest
    pub g0: f32,
    /// Resting potential (mV)
    pub v0: f32,
    /// Voltages above this value are clamped (mV)
    pub ap_threshold: f32,
    /// Fraction of the target to load, in `[0, 1]`
    pub fraction: f32,
    /// Frame interval (ms), the report step when absent
    pub time_step: Option<f32>,
    /// Requested time range
    pub time_range: TimeRangeRequest,
    /// Interpolate between attenuation curve samples
    pub interpolate_attenuation: bool,
    /// Write the full volume of every frame
    pub export_volume: bool,
    /// Write the soma pixel table
    pub export_soma_pixels: bool,
    /// Morphologies held at once while loading geometry
    pub cells_per_batch: usize,
}

impl Default for VsdParams {
    fn default() -> Self {
        Self {
            target: String::new(),
            voltage_report: "voltages".to_string(),
            area_report: "areas".to_string(),
            curve_file: None,
            sensor_dim: 1000.0,
            sensor_res: 512,
            depth: 2081.756,
            sigma: 0.0045,
            g0: 0.0,
            v0: -65.0,
            ap_threshold: f32::MAX,
            fraction: 1.0,
            time_step: None,
            time_range: TimeRangeRequest::full(),
            interpolate_attenuation: false,
            export_volume: false,
            export_soma_pixels: false,
            cells_per_batch: 10_000,
        }
    }
}

impl VsdParams {
    /// Edge length of a sensor voxel (µm)
    pub fn voxel_size(&self) -> f32 {
        self.sensor_dim / self.sensor_res as f32
    }
}
