//! Configuration error types.

use std::path::PathBuf;

/// Result type alias for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        /// Path that failed to read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A rate value is outside its valid range.
    #[error("invalid rate for {field}: {value} (valid range {range})")]
    InvalidRate {
        /// Field name
        field: &'static str,
        /// Offending value
        value: u32,
        /// Human-readable valid range
        range: &'static str,
    },

    /// A duration value is below its minimum.
    #[error("{field} of {value}s is below the minimum of {min}s")]
    DurationTooShort {
        /// Field name
        field: &'static str,
        /// Offending value in seconds
        value: u64,
        /// Minimum in seconds
        min: u64,
    },

    /// A required non-zero value is zero.
    #[error("{0} must be non-zero")]
    ZeroValue(&'static str),
}
