//! Tracing subscriber setup for controller binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// `default_directive` (for example `"info"` or
/// `"converge_composed=debug,info"`) applies when `RUST_LOG` is unset or
/// unparseable.
///
/// # Errors
///
/// Returns [`Error::Telemetry`] if the directive is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| Error::telemetry(format!("invalid filter directive: {e}")))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| Error::telemetry(e.to_string()))
}
