//! Configuration error types.

use thiserror::Error;

/// Result type alias for settings validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invariant violations detected while validating a configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_instances ({max}) is below min_instances ({min})")]
    MaxBelowMin { min: u32, max: u32 },

    #[error("load_threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("monitor_window must be at least 1")]
    EmptyWindow,

    #[error("max_threshold_violations must be at least 1")]
    ZeroViolations,

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("invalid thread_prefix {0:?}: must be 1 to 14 bytes")]
    ThreadPrefix(String),
}
