//! Sequential composition of actions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, debug_span, warn, Instrument};

use crate::action::{Action, ActionRef};
use crate::context::Context;
use crate::signal::{Signal, CONTINUE};

/// Runs actions in declared order, stopping at the first non-continue signal.
///
/// An exhausted sequence continues, so sequences nest. The name only shows up
/// in traces. Signals pass through untouched.
pub struct Sequence<S> {
    name: String,
    actions: Vec<ActionRef<S>>,
}

impl<S: Send + 'static> Sequence<S> {
    /// Create an empty sequence.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Append an action.
    #[must_use]
    pub fn then(mut self, action: ActionRef<S>) -> Self {
        self.actions.push(action);
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Share the sequence as an action.
    pub fn into_ref(self) -> ActionRef<S> {
        Arc::new(self)
    }
}

/// Compose `actions` into one action named `name`.
pub fn compose_actions<S, I>(name: impl Into<String>, actions: I) -> ActionRef<S>
where
    S: Send + 'static,
    I: IntoIterator<Item = ActionRef<S>>,
{
    Arc::new(Sequence {
        name: name.into(),
        actions: actions.into_iter().collect(),
    })
}

#[async_trait]
impl<S: Send + 'static> Action<S> for Sequence<S> {
    async fn run(&self, ctx: &mut Context, state: &mut S) -> Signal {
        let span = debug_span!(parent: ctx.span(), "compose", name = %self.name);
        async {
            for action in &self.actions {
                if let Some(err) = ctx.err() {
                    warn!(
                        action = action.name(),
                        error = %err,
                        "Context done before action, stopping"
                    );
                    return Signal::Propagate(err);
                }

                debug!(action = action.name(), "Running action");
                let signal = action.run(ctx, state).await;

                if signal.is_terminal() {
                    debug!(action = action.name(), signal = %signal, "Action stopped the sequence");
                    return signal;
                }
            }
            CONTINUE
        }
        .instrument(span)
        .await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
