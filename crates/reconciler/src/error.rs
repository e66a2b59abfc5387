//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Configuration values are out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Configuration file could not be read.
    #[error("failed to read config file {path}: {reason}")]
    ConfigRead { path: String, reason: String },

    /// Configuration file is not valid TOML for the expected schema.
    #[error("failed to parse config: {reason}")]
    ConfigParse { reason: String },

    /// The tracing subscriber could not be installed.
    #[error("failed to initialize telemetry: {reason}")]
    Telemetry { reason: String },
}

impl Error {
    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a config read error.
    pub fn config_read(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigRead {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a config parse error.
    pub fn config_parse(reason: impl Into<String>) -> Self {
        Self::ConfigParse {
            reason: reason.into(),
        }
    }

    /// Create a telemetry error.
    pub fn telemetry(reason: impl Into<String>) -> Self {
        Self::Telemetry {
            reason: reason.into(),
        }
    }
}
