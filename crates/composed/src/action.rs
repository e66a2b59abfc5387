//! The action trait and its adapters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::Context;
use crate::signal::{Signal, CONTINUE, STOP_AND_FORGET};

/// A named unit of work over the pass state.
///
/// Actions must not rely on any other step having run except through values
/// placed in the state, and must be safe to re-run from scratch on the next
/// pass. An action may replace the ambient context for later steps by
/// assigning through `ctx`.
#[async_trait]
pub trait Action<S>: Send + Sync {
    /// Execute the action.
    async fn run(&self, ctx: &mut Context, state: &mut S) -> Signal;

    /// Name used in logs and traces.
    fn name(&self) -> &str;
}

/// Shared, type-erased action.
pub type ActionRef<S> = Arc<dyn Action<S>>;

/// Action backed by an async closure returning a boxed future.
pub struct FnAction<F> {
    name: String,
    func: F,
}

/// Wrap an async closure as an action.
///
/// ```ignore
/// let load = action_fn("load_vpc", |ctx, state: &mut MyState| {
///     Box::pin(async move {
///         // ...
///         CONTINUE
///     })
/// });
/// ```
pub fn action_fn<S, F>(name: impl Into<String>, func: F) -> ActionRef<S>
where
    S: Send + 'static,
    F: for<'a> Fn(&'a mut Context, &'a mut S) -> BoxFuture<'a, Signal> + Send + Sync + 'static,
{
    Arc::new(FnAction {
        name: name.into(),
        func,
    })
}

#[async_trait]
impl<S, F> Action<S> for FnAction<F>
where
    S: Send,
    F: for<'a> Fn(&'a mut Context, &'a mut S) -> BoxFuture<'a, Signal> + Send + Sync,
{
    async fn run(&self, ctx: &mut Context, state: &mut S) -> Signal {
        (self.func)(ctx, state).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Action backed by a synchronous closure.
pub struct SyncFnAction<F> {
    name: String,
    func: F,
}

/// Wrap a synchronous closure as an action.
pub fn sync_action_fn<S, F>(name: impl Into<String>, func: F) -> ActionRef<S>
where
    S: Send + 'static,
    F: Fn(&mut Context, &mut S) -> Signal + Send + Sync + 'static,
{
    Arc::new(SyncFnAction {
        name: name.into(),
        func,
    })
}

#[async_trait]
impl<S, F> Action<S> for SyncFnAction<F>
where
    S: Send,
    F: Fn(&mut Context, &mut S) -> Signal + Send + Sync,
{
    async fn run(&self, ctx: &mut Context, state: &mut S) -> Signal {
        (self.func)(ctx, state)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Always continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueAction;

#[async_trait]
impl<S: Send> Action<S> for ContinueAction {
    async fn run(&self, _ctx: &mut Context, _state: &mut S) -> Signal {
        CONTINUE
    }

    fn name(&self) -> &str {
        "continue"
    }
}

/// Ends the pass cleanly. Typically the last step of an active pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopAndForgetAction;

#[async_trait]
impl<S: Send> Action<S> for StopAndForgetAction {
    async fn run(&self, _ctx: &mut Context, _state: &mut S) -> Signal {
        STOP_AND_FORGET
    }

    fn name(&self) -> &str {
        "stopAndForget"
    }
}

/// Ends the pass and asks for another one.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopWithRequeueAction {
    after: Option<Duration>,
}

impl StopWithRequeueAction {
    /// Requeue with the scheduler's default delay.
    pub const fn new() -> Self {
        Self { after: None }
    }

    /// Requeue after `delay`.
    pub const fn after(delay: Duration) -> Self {
        Self { after: Some(delay) }
    }
}

#[async_trait]
impl<S: Send> Action<S> for StopWithRequeueAction {
    async fn run(&self, _ctx: &mut Context, _state: &mut S) -> Signal {
        Signal::StopWithRequeue { after: self.after }
    }

    fn name(&self) -> &str {
        "stopWithRequeue"
    }
}
