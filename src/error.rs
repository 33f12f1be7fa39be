//! Error types shared across the controller core, configuration and codec.
//!
//! Three families, one per boundary:
//! - **ControlError:** numerical degeneracy inside the core (the only recoverable-by-caller path).
//! - **ConfigError:** rejected at startup, before any run begins.
//! - **TelemetryError:** malformed frames, rejected before they reach the core.

use thiserror::Error;

/// Numerical degeneracy detected by the controller core.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ControlError {
    /// `mean_cost()` was asked for a run in which the window policy admitted no sample.
    #[error("mean cost undefined: run of {samples} samples produced no qualifying cost samples")]
    DegenerateRun { samples: usize },
}

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("run length must be at least 1 sample")]
    ZeroRunLength,

    #[error("step size for dimension {index} must be positive and finite, got {value}")]
    InvalidStepSize { index: usize, value: f64 },

    #[error("gain {name} must be finite, got {value}")]
    NonFiniteGain { name: &'static str, value: f64 },

    #[error("window fraction must lie in [0, 1), got {0}")]
    InvalidWindowFraction(f64),

    #[error("{name} must be positive and finite, got {value}")]
    NonPositiveParameter { name: &'static str, value: f64 },

    #[error("expected 3 gains or 3 gains plus 3 step sizes, got {0} numbers")]
    ParamCount(usize),

    #[error("server host must not be empty")]
    EmptyHost,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Malformed simulator frame.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("frame payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame payload is not an [event, data] array")]
    NotAnEvent,

    #[error("telemetry field `{0}` is missing")]
    MissingField(&'static str),

    #[error("telemetry field `{field}` is not numeric: {raw}")]
    NotNumeric { field: &'static str, raw: String },
}
