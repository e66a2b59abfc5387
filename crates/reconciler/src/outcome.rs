//! Translation of a pass's final signal into a scheduling decision.

use std::fmt;
use std::time::Duration;

use converge_composed::{Error as PipelineError, Signal};

use crate::config::ReconcilerConfig;

/// What the scheduler should do with an object after a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; wait for the next change.
    Done,
    /// Run another pass after `after`.
    Requeue { after: Duration },
    /// The pass failed; retry after the backoff delay.
    Failed {
        error: PipelineError,
        retry_after: Duration,
    },
}

impl ReconcileOutcome {
    /// Delay before the next pass, if one is wanted.
    pub const fn next_pass_in(&self) -> Option<Duration> {
        match self {
            Self::Done => None,
            Self::Requeue { after } => Some(*after),
            Self::Failed { retry_after, .. } => Some(*retry_after),
        }
    }

    /// Whether the pass converged.
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Whether the pass failed.
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The failure, if any.
    pub const fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Requeue { after } => write!(f, "requeue after {}ms", after.as_millis()),
            Self::Failed { error, retry_after } => {
                write!(f, "failed ({error}), retry after {}ms", retry_after.as_millis())
            }
        }
    }
}

/// Map the top-level signal of a pass to an outcome.
///
/// `failures` is the object's consecutive failure count including this
/// pass; it only matters for [`Signal::Propagate`].
pub fn handle_signal(signal: Signal, config: &ReconcilerConfig, failures: u32) -> ReconcileOutcome {
    match signal {
        Signal::Continue | Signal::StopAndForget => ReconcileOutcome::Done,
        Signal::StopWithRequeue { after } => ReconcileOutcome::Requeue {
            after: after.unwrap_or_else(|| config.requeue_delay()),
        },
        Signal::Propagate(error) => ReconcileOutcome::Failed {
            error,
            retry_after: config.backoff.delay_for(failures),
        },
    }
}
