//! Predicate-guarded branching between pipelines.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, debug_span, Instrument};

use crate::action::{Action, ActionRef};
use crate::context::Context;
use crate::predicate::PredicateRef;
use crate::signal::{Signal, CONTINUE};

/// A predicate paired with the pipeline it selects.
pub struct Case<S> {
    predicate: PredicateRef<S>,
    action: ActionRef<S>,
}

impl<S> Case<S> {
    /// Create a case.
    pub fn new(predicate: PredicateRef<S>, action: ActionRef<S>) -> Self {
        Self { predicate, action }
    }
}

/// Runs the first case whose predicate matches, or the default pipeline.
///
/// Cases are tested in declaration order and exactly one pipeline runs per
/// invocation. Without a default and without a matching case the switch
/// continues.
pub struct Switch<S> {
    name: String,
    default: Option<ActionRef<S>>,
    cases: Vec<Case<S>>,
}

impl<S: Send + 'static> Switch<S> {
    /// Create a switch with a default pipeline.
    pub fn new(name: impl Into<String>, default: Option<ActionRef<S>>) -> Self {
        Self {
            name: name.into(),
            default,
            cases: Vec::new(),
        }
    }

    /// Append a case.
    #[must_use]
    pub fn case(mut self, predicate: PredicateRef<S>, action: ActionRef<S>) -> Self {
        self.cases.push(Case::new(predicate, action));
        self
    }

    /// Share the switch as an action.
    pub fn into_ref(self) -> ActionRef<S> {
        Arc::new(self)
    }
}

impl<S> Switch<S> {
    fn select(&self, ctx: &Context, state: &S) -> Option<(usize, &ActionRef<S>)> {
        self.cases
            .iter()
            .enumerate()
            .find(|(_, case)| case.predicate.test(ctx, state))
            .map(|(idx, case)| (idx, &case.action))
    }
}

/// Build a switch action from a default pipeline and ordered cases.
pub fn build_switch_action<S, I>(
    name: impl Into<String>,
    default: Option<ActionRef<S>>,
    cases: I,
) -> ActionRef<S>
where
    S: Send + 'static,
    I: IntoIterator<Item = Case<S>>,
{
    Arc::new(Switch {
        name: name.into(),
        default,
        cases: cases.into_iter().collect(),
    })
}

/// Run `then` when `predicate` holds, `otherwise` when it does not.
pub fn if_else<S: Send + 'static>(
    name: impl Into<String>,
    predicate: PredicateRef<S>,
    then: ActionRef<S>,
    otherwise: Option<ActionRef<S>>,
) -> ActionRef<S> {
    Switch::new(name, otherwise).case(predicate, then).into_ref()
}

#[async_trait]
impl<S: Send + 'static> Action<S> for Switch<S> {
    async fn run(&self, ctx: &mut Context, state: &mut S) -> Signal {
        let span = debug_span!(parent: ctx.span(), "switch", name = %self.name);
        let chosen = {
            let _entered = span.enter();
            match self.select(ctx, state) {
                Some((idx, action)) => {
                    debug!(case = idx, action = action.name(), "Case matched");
                    Some(Arc::clone(action))
                }
                None => {
                    debug!("No case matched, running default");
                    self.default.clone()
                }
            }
        };

        match chosen {
            Some(action) => action.run(ctx, state).instrument(span).await,
            None => CONTINUE,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
