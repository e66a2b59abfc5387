//! Driver configuration.
//!
//! All fields have defaults, so an empty TOML document is a valid config.
//!
//! ```toml
//! requeue_delay_ms = 30000
//! pass_timeout_ms = 60000
//!
//! [backoff]
//! initial_ms = 1000
//! max_ms = 300000
//! multiplier = 2.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default delay for a requeue that names none.
pub const DEFAULT_REQUEUE_DELAY_MS: u64 = 30_000;

/// Exponential backoff applied to failed passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_ms: u64,
    /// Upper bound on any delay.
    pub max_ms: u64,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1_000,
            max_ms: 300_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Delay after the first failure.
    pub const fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    /// Upper bound on any delay.
    pub const fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Delay before retrying after `failures` consecutive failures.
    ///
    /// `failures` counts the current one, so `1` yields the initial delay.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        // Float-to-int casts saturate, and min() discards NaN.
        Duration::from_millis(millis.min(self.max_ms as f64) as u64)
    }

    fn validate(&self) -> Result<()> {
        if self.initial_ms == 0 {
            return Err(Error::invalid_config("backoff.initial_ms must be > 0"));
        }
        if self.max_ms < self.initial_ms {
            return Err(Error::invalid_config(
                "backoff.max_ms must be >= backoff.initial_ms",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::invalid_config(
                "backoff.multiplier must be a finite number >= 1.0",
            ));
        }
        Ok(())
    }
}

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Delay used when an action requeues without naming one.
    pub requeue_delay_ms: u64,
    /// Upper bound on a single pass. Unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_timeout_ms: Option<u64>,
    /// Backoff after failed passes.
    pub backoff: BackoffConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_delay_ms: DEFAULT_REQUEUE_DELAY_MS,
            pass_timeout_ms: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Delay used when an action requeues without naming one.
    pub const fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    /// Upper bound on a single pass.
    pub fn pass_timeout(&self) -> Option<Duration> {
        self.pass_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] for malformed TOML and
    /// [`Error::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config_parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRead`] if the file cannot be read, otherwise
    /// as [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::ConfigParse { reason } => {
                Error::config_parse(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    /// Check that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.pass_timeout_ms == Some(0) {
            return Err(Error::invalid_config("pass_timeout_ms must be > 0 when set"));
        }
        self.backoff.validate()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ReconcilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ReconcilerConfig::default());
        assert_eq!(config.requeue_delay(), Duration::from_secs(30));
        assert_eq!(config.pass_timeout(), None);
    }

    #[test]
    fn test_partial_document_overrides() {
        let config = ReconcilerConfig::from_toml_str(
            r"
            pass_timeout_ms = 5000

            [backoff]
            max_ms = 10000
            ",
        )
        .unwrap();
        assert_eq!(config.pass_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.backoff.max(), Duration::from_secs(10));
        assert_eq!(config.backoff.initial(), Duration::from_secs(1));
    }

    #[test]
    fn test_malformed_toml() {
        let result = ReconcilerConfig::from_toml_str("requeue_delay_ms = \"soon\"");
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_validation() {
        let mut config = ReconcilerConfig::default();
        config.backoff.initial_ms = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));

        let mut config = ReconcilerConfig::default();
        config.backoff.max_ms = 10;
        assert!(config.validate().is_err());

        let mut config = ReconcilerConfig::default();
        config.backoff.multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = ReconcilerConfig::default();
        config.pass_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = BackoffConfig {
            initial_ms: 100,
            max_ms: 1_000,
            multiplier: 2.0,
        };
        assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(800));
        assert_eq!(backoff.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_millis(1_000));
    }
}
