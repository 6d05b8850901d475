//! Simulation time axis: range validation, frame stepping and file suffixes

use crate::error::{EmsimError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Time range requested by the user (ms)
///
/// A negative or missing bound means "use everything the report offers".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeRequest {
    /// Requested start time (ms), negative for report start
    pub start: f32,
    /// Requested end time (ms), negative for report end
    pub end: f32,
}

impl TimeRangeRequest {
    /// Request the full report range
    pub fn full() -> Self {
        Self {
            start: -1.0,
            end: -1.0,
        }
    }

    /// Request an explicit range
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }
}

impl Default for TimeRangeRequest {
    fn default() -> Self {
        Self::full()
    }
}

/// Validated time axis of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    start: f32,
    end: f32,
    dt: f32,
    frames: usize,
}

impl Timeline {
    /// Clamp `request` into the report bounds and derive the frame count
    ///
    /// The last usable frame starts at `report_end - dt`. Clamping is silent
    /// apart from a warning.
    ///
    /// # Errors
    /// Returns [`EmsimError::InvalidTimeRange`] if the start still lies after
    /// the end once clamped, and [`EmsimError::InvalidParameter`] for a
    /// non-positive `dt`.
    pub fn resolve(
        request: TimeRangeRequest,
        report_start: f32,
        report_end: f32,
        dt: f32,
    ) -> Result<Self> {
        if dt <= 0.0 || !dt.is_finite() {
            return Err(EmsimError::InvalidParameter(format!(
                "time step must be positive, got {dt}"
            )));
        }

        let last_frame = report_end - dt;
        let (mut start, mut end) = (request.start, request.end);

        if start < 0.0 || end < 0.0 {
            start = report_start;
            end = last_frame;
            warn!("Time range used is the maximum available");
        } else if end > last_frame {
            end = last_frame;
            warn!("Time range is clamped to the maximum bound");
        }

        if start < report_start {
            start = report_start;
            warn!("Time range is clamped to the minimum bound");
        }

        info!("Time range is: [{} {}] with DT: {}", start, end, dt);

        if start > end {
            return Err(EmsimError::InvalidTimeRange { start, end });
        }

        let frames = 1 + ((end - start) / dt).round() as usize;
        info!("Total number of frames: {}", frames);

        Ok(Self {
            start,
            end,
            dt,
            frames,
        })
    }

    /// First frame time (ms)
    pub fn start(&self) -> f32 {
        self.start
    }

    /// Last frame time (ms)
    pub fn end(&self) -> f32 {
        self.end
    }

    /// Frame interval (ms)
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Number of frames in the range
    pub fn frames_count(&self) -> usize {
        self.frames
    }

    /// Simulation time of frame `frame`
    pub fn time_of(&self, frame: usize) -> f32 {
        self.start + frame as f32 * self.dt
    }
}

/// Round a requested frame interval to a whole multiple of the report step
///
/// Never finer than the report: a request below half a report step still
/// yields one report step.
pub fn effective_dt(requested: f32, report_dt: f32) -> f32 {
    let multiplier = (requested / report_dt).round().max(1.0);
    multiplier * report_dt
}

/// Canonical textual time used in output file names
///
/// Four fixed decimals with trailing zeros removed, always keeping one digit
/// after the decimal point.
pub fn time_suffix(time: f32) -> String {
    let mut text = format!("{time:.4}");
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    text
}
