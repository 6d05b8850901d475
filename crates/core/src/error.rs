//! Error type shared by every stage of the projection pipelines
//!
//! Failures are either compensated silently (time-range clamping, dropped
//! compartments) or surfaced through `EmsimError` and abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading geometry, projecting frames or writing output
#[derive(Debug, Error)]
pub enum EmsimError {
    /// Start time lies after end time once clamped to the report bounds
    #[error("invalid time range [{start} {end}]")]
    InvalidTimeRange {
        /// Clamped start time (ms)
        start: f32,
        /// Clamped end time (ms)
        end: f32,
    },

    /// Voltage and area reports do not describe the same compartments
    #[error("area and voltage report sizes don't match: voltage {voltage}, area {area}")]
    ReportSizeMismatch {
        /// Frame size of the voltage report
        voltage: usize,
        /// Frame size of the area report
        area: usize,
    },

    /// A numeric buffer could not be reserved
    #[error("failed to allocate {elements} floats")]
    Allocation {
        /// Number of `f32` elements requested
        elements: usize,
    },

    /// A file could not be opened, read or written
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// Path of the offending file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A caller-supplied parameter is outside its valid domain
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An external circuit or report provider failed
    #[error("provider error: {0}")]
    Provider(String),

    /// A scene description could not be parsed
    #[error("scene error: {0}")]
    Scene(String),
}

impl EmsimError {
    /// Wrap an I/O error together with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EmsimError>;
