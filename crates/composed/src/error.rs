//! Error types for the composed crate.

use thiserror::Error;

/// Result type alias for composed operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by steps, the status persistence collaborator, or the
/// engine itself.
///
/// Errors are cheap to clone so they can travel inside a
/// [`Signal::Propagate`](crate::Signal::Propagate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Persisting the object's status failed.
    #[error("status update for '{object}' failed: {reason}")]
    StatusUpdateFailed { object: String, reason: String },

    /// Optimistic concurrency check failed while persisting.
    #[error("conflict updating '{object}': expected resource version {expected}, found {actual}")]
    Conflict {
        object: String,
        expected: u64,
        actual: u64,
    },

    /// The object no longer exists in the backing store.
    #[error("object '{object}' not found")]
    ObjectNotFound { object: String },

    /// A reconciliation step failed.
    #[error("step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    /// Building the per-pass state failed.
    #[error("failed to initialize state: {reason}")]
    StateInit { reason: String },

    /// The ambient context was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// The ambient context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Invalid builder or action configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A lower-level error with added context.
    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a status update failed error.
    pub fn status_update_failed(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StatusUpdateFailed {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(object: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            object: object.into(),
            expected,
            actual,
        }
    }

    /// Create an object not found error.
    pub fn object_not_found(object: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            object: object.into(),
        }
    }

    /// Create a step failed error.
    pub fn step_failed(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Create a state init error.
    pub fn state_init(reason: impl Into<String>) -> Self {
        Self::StateInit {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Wrap this error with additional context.
    #[must_use]
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any [`Error::Wrapped`] layers.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Wrapped { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if retrying the whole pass may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::StatusUpdateFailed { .. }
                | Self::Conflict { .. }
                | Self::StepFailed { .. }
                | Self::DeadlineExceeded
        )
    }
}
