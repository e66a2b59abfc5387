//! Ambient context threaded through every action.
//!
//! The context carries the contextual logger (a tracing span plus key/value
//! fields), an optional cancellation flag and an optional deadline. The engine
//! never alters it; steps may replace it for the steps after them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use futures::future;
use itertools::Itertools;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Span;

use crate::error::Error;

/// Ambient context for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Context {
    span: Span,
    fields: Fields,
    cancel: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every context derived from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`CancelHandle::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Key/value logging fields attached to a context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.iter().map(|(k, v)| format!("{k}={v}")).join(" ")
        )
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            span: Span::current(),
            fields: Fields::default(),
            cancel: Vec::new(),
            deadline: None,
        }
    }

    /// Derive a cancellable context.
    ///
    /// The derived context is also cancelled by every handle of its parents.
    #[must_use]
    pub fn with_cancellation(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel.push(rx);
        (self, CancelHandle { tx })
    }

    /// Derive a context with a deadline. An earlier existing deadline wins.
    #[must_use]
    pub fn with_deadline(self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    /// Derive a context whose deadline is `timeout` from now.
    ///
    /// A timeout too large to represent leaves the context unbounded.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Derive a context that logs under `span`.
    #[must_use]
    pub fn with_span(self, span: Span) -> Self {
        Self { span, ..self }
    }

    /// Derive a context with an extra logging field.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.0.insert(key.into(), value.to_string());
        self
    }

    /// The contextual logger span.
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// The contextual logging fields.
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// The deadline, if any.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the context was cancelled or its deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done, if it is.
    pub fn err(&self) -> Option<Error> {
        if self.cancel.iter().any(|rx| *rx.borrow()) {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a background context.
    pub async fn cancelled(&self) -> Error {
        let waiters = self.cancel.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                    Error::Cancelled
                } else {
                    // Handle dropped without cancelling: never fires.
                    future::pending().await
                }
            })
        });
        let cancelled = async {
            if self.cancel.is_empty() {
                future::pending().await
            } else {
                future::select_all(waiters).await.0
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    Error::DeadlineExceeded
                }
                None => future::pending().await,
            }
        };
        tokio::select! {
            err = cancelled => err,
            err = expired => err,
        }
    }
}
