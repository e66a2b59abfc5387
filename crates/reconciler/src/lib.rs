//! Pass driver for composed reconcile pipelines.
//!
//! This crate sits between a scheduler (work queue, informer, timer) and a
//! pipeline built with `converge-composed`:
//!
//! - **Pass**: build the per-pass state, run the top-level action under its
//!   own span and pass id, optionally bounded by a timeout
//! - **Outcome**: translate the final signal into done, requeue or failed
//! - **Backoff**: grow the retry delay with each consecutive failure
//! - **Config**: TOML-loadable driver settings
//!
//! # Example
//!
//! ```ignore
//! use converge_reconciler::{init_tracing, BaseStateFactory, Reconciler, ReconcilerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> converge_reconciler::Result<()> {
//!     init_tracing("info")?;
//!     let config = ReconcilerConfig::load("converge.toml")?;
//!
//!     let store = Arc::new(MyApiWriter::new());
//!     let reconciler = Reconciler::new(
//!         ip_range_machine(),
//!         Arc::new(BaseStateFactory::new(store)),
//!         config,
//!     )?;
//!
//!     let outcome = reconciler.reconcile(fetched_object).await;
//!     if let Some(delay) = outcome.next_pass_in() {
//!         queue.add_after(key, delay);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod outcome;
pub mod reconciler;
pub mod telemetry;

// Re-export main types
pub use config::{BackoffConfig, ReconcilerConfig, DEFAULT_REQUEUE_DELAY_MS};
pub use error::{Error, Result};
pub use outcome::{handle_signal, ReconcileOutcome};
pub use reconciler::{BaseStateFactory, Reconciler, StateFactory};
pub use telemetry::init_tracing;
