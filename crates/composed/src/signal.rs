//! Control signals returned by every action.
//!
//! A signal tells the enclosing composer whether to run the next step or to
//! stop the pass, and tells the scheduler whether to forget the object,
//! requeue it, or treat the pass as failed.

use std::fmt;
use std::time::Duration;

use tracing::error;

use crate::context::Context;
use crate::error::{Error, Result};

/// Outcome of a single action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Proceed to the next step.
    Continue,
    /// End the pass cleanly; nothing more to do until the object changes.
    StopAndForget,
    /// End the pass and schedule another one, optionally after a delay.
    StopWithRequeue { after: Option<Duration> },
    /// End the pass with a failure the scheduler applies its own backoff to.
    Propagate(Error),
}

/// Shared continue signal.
pub const CONTINUE: Signal = Signal::Continue;

/// Shared stop-and-forget signal.
pub const STOP_AND_FORGET: Signal = Signal::StopAndForget;

/// Shared stop-and-requeue signal using the scheduler's default delay.
pub const STOP_WITH_REQUEUE: Signal = Signal::StopWithRequeue { after: None };

/// Discriminant of a [`Signal`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Continue,
    StopAndForget,
    StopWithRequeue,
    Propagate,
}

impl Signal {
    /// Stop the pass and requeue after `delay`.
    pub const fn requeue_after(delay: Duration) -> Self {
        Self::StopWithRequeue { after: Some(delay) }
    }

    /// Stop the pass with `err`.
    pub fn propagate(err: impl Into<Error>) -> Self {
        Self::Propagate(err.into())
    }

    /// `Ok` continues, `Err` propagates.
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(err) => Self::Propagate(err),
        }
    }

    /// Whether the next step should run.
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Whether the enclosing composer must stop.
    pub const fn is_terminal(&self) -> bool {
        !self.is_continue()
    }

    /// The payload-free discriminant.
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::Continue => SignalKind::Continue,
            Self::StopAndForget => SignalKind::StopAndForget,
            Self::StopWithRequeue { .. } => SignalKind::StopWithRequeue,
            Self::Propagate(_) => SignalKind::Propagate,
        }
    }

    /// The propagated error, if any.
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Propagate(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Error> for Signal {
    fn from(err: Error) -> Self {
        Self::Propagate(err)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::StopAndForget => write!(f, "stop and forget"),
            Self::StopWithRequeue { after: None } => write!(f, "stop with requeue"),
            Self::StopWithRequeue { after: Some(delay) } => {
                write!(f, "stop with requeue after {}ms", delay.as_millis())
            }
            Self::Propagate(err) => write!(f, "propagate: {err}"),
        }
    }
}

/// Log `err` under `msg` with the context's fields and return `signal`.
pub fn log_error_and_return(ctx: &Context, err: &Error, msg: &str, signal: Signal) -> Signal {
    ctx.span().in_scope(|| {
        error!(
            error = %err,
            fields = %ctx.fields(),
            signal = %signal,
            "{msg}"
        );
    });
    signal
}
