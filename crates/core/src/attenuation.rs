//! Depth-dependent dye attenuation for voltage-sensitive-dye imaging
//!
//! The dye curve is an empirical response profile sampled at equal depth
//! intervals from the emitting surface (`y = thickness`) down to `y = 0`.
//! Samples are normalized so the curve peaks at 1.0. With no curve loaded the
//! attenuation is a constant 1.0.

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Normalized dye attenuation curve over the circuit thickness
#[derive(Debug, Clone, PartialEq)]
pub struct AttenuationCurve {
    dye_curve: Vec<f32>,
    thickness: f32,
}

impl AttenuationCurve {
    /// Curve that never attenuates
    pub fn none() -> Self {
        Self {
            dye_curve: Vec::new(),
            thickness: 1.0,
        }
    }

    /// Build a curve from raw (non-negative) samples, normalizing by their maximum
    pub fn from_samples(samples: Vec<f32>, thickness: f32) -> Self {
        let mut dye_curve = samples;
        let max = dye_curve.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max > 0.0 {
            for value in &mut dye_curve {
                *value /= max;
            }
        }
        Self {
            dye_curve,
            thickness,
        }
    }

    /// Load a curve from a file holding one value per line
    ///
    /// A missing path, an unreadable file or a file without values yields a
    /// curve that never attenuates; this is not an error.
    pub fn load(path: Option<&Path>, thickness: f32) -> Self {
        let Some(path) = path else {
            return Self {
                thickness,
                ..Self::none()
            };
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(
                    "Cannot read dye curve '{}': {e}. No attenuation applied",
                    path.display()
                );
                return Self {
                    thickness,
                    ..Self::none()
                };
            }
        };

        let samples = parse_samples(&contents);
        debug!(
            "Loaded {} dye curve samples from '{}'",
            samples.len(),
            path.display()
        );
        Self::from_samples(samples, thickness)
    }

    /// Number of curve samples
    pub fn len(&self) -> usize {
        self.dye_curve.len()
    }

    /// True when no attenuation is applied
    pub fn is_empty(&self) -> bool {
        self.dye_curve.is_empty()
    }

    /// Circuit thickness the curve spans
    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// Normalized samples, surface first
    pub fn samples(&self) -> &[f32] {
        &self.dye_curve
    }

    /// Attenuation factor at absolute height `y`
    ///
    /// Depth is measured from the surface, `thickness - y`. Points at or
    /// above the surface get the first sample, points at or below the full
    /// thickness get the last one. In between the curve is split into
    /// `len - 1` equal bins; without interpolation the sample closing the bin
    /// is returned, with interpolation the two bin samples are blended.
    pub fn attenuation(&self, y: f32, interpolate: bool) -> f32 {
        let curve = &self.dye_curve;
        if curve.is_empty() || self.thickness <= 0.0 {
            return 1.0;
        }

        if y >= self.thickness {
            return curve[0];
        }

        let depth = self.thickness - y;
        let last = curve.len() - 1;
        if last == 0 || depth >= self.thickness {
            return curve[last];
        }

        let bin_width = self.thickness / last as f32;
        let index = ((depth / bin_width) as usize).min(last - 1);

        let closing = curve[index + 1];
        if !interpolate {
            return closing;
        }

        let t = (depth - bin_width * index as f32) / bin_width;
        t * closing + (1.0 - t) * curve[index]
    }
}

impl Default for AttenuationCurve {
    fn default() -> Self {
        Self::none()
    }
}

/// One sample per line, including blank lines
///
/// Each line contributes its leading numeric prefix, or 0.0 when it has none,
/// so the bin count always equals the line count.
fn parse_samples(contents: &str) -> Vec<f32> {
    contents
        .lines()
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return 0.0;
            }
            leading_float(line).unwrap_or_else(|| {
                warn!("Malformed dye curve line '{line}' read as 0");
                0.0
            })
        })
        .collect()
}

fn leading_float(text: &str) -> Option<f32> {
    text.char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .rev()
        .find_map(|end| text[..end].parse::<f32>().ok())
}
