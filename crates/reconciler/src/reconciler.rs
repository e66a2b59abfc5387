//! Reconcile pass driver.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use converge_composed::{
    ActionRef, BaseState, Context, Error as PipelineError, Object, ObjectKey, Signal, StatusWriter,
};
use futures::future::join_all;
use itertools::Itertools;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use ulid::Ulid;

use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::outcome::{handle_signal, ReconcileOutcome};

/// Builds the per-pass state from a freshly fetched object.
#[async_trait]
pub trait StateFactory<O: Object, S>: Send + Sync {
    /// Build the state for one pass.
    async fn build(&self, ctx: &Context, obj: O) -> converge_composed::Result<S>;
}

/// Factory producing a [`BaseState`] backed by a status writer.
pub struct BaseStateFactory<O: Object> {
    writer: Arc<dyn StatusWriter<O>>,
}

impl<O: Object> BaseStateFactory<O> {
    /// Create a factory persisting through `writer`.
    pub fn new(writer: Arc<dyn StatusWriter<O>>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<O: Object> StateFactory<O, BaseState<O>> for BaseStateFactory<O> {
    async fn build(&self, _ctx: &Context, obj: O) -> converge_composed::Result<BaseState<O>> {
        Ok(BaseState::new(obj, Arc::clone(&self.writer)))
    }
}

/// Runs one pipeline per object pass and decides when the object is seen again.
///
/// Tracks consecutive failures per object to drive the retry backoff. A pass
/// that converges or requeues resets the count.
pub struct Reconciler<O: Object, S> {
    action: ActionRef<S>,
    factory: Arc<dyn StateFactory<O, S>>,
    config: ReconcilerConfig,
    failures: Mutex<HashMap<ObjectKey, u32>>,
    _object: PhantomData<fn(O)>,
}

impl<O: Object, S: Send + 'static> Reconciler<O, S> {
    /// Create a reconciler running `action` on states built by `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// configuration does not validate.
    pub fn new(
        action: ActionRef<S>,
        factory: Arc<dyn StateFactory<O, S>>,
        config: ReconcilerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            action,
            factory,
            config,
            failures: Mutex::new(HashMap::new()),
            _object: PhantomData,
        })
    }

    /// Run one pass with a background context.
    pub async fn reconcile(&self, obj: O) -> ReconcileOutcome {
        self.reconcile_with(Context::background(), obj).await
    }

    /// Run one pass derived from `parent`.
    ///
    /// The pass gets its own span and id. When a pass timeout is configured
    /// the pass is abandoned once it elapses.
    pub async fn reconcile_with(&self, parent: Context, obj: O) -> ReconcileOutcome {
        let key = obj.key();
        let pass_id = Ulid::new();
        let span = info_span!(
            parent: parent.span(),
            "reconcile",
            kind = obj.kind(),
            object = %key,
            pass_id = %pass_id
        );

        async {
            let mut ctx = parent
                .with_span(Span::current())
                .with_value("pass_id", pass_id);
            if let Some(timeout) = self.config.pass_timeout() {
                ctx = ctx.with_timeout(timeout);
            }

            debug!(action = self.action.name(), "Starting pass");
            let signal = match self.factory.build(&ctx, obj).await {
                Ok(mut state) => self.run_bounded(&mut ctx, &mut state).await,
                Err(err) => {
                    warn!(error = %err, "Failed to build pass state");
                    Signal::Propagate(err)
                }
            };

            self.record(&key, signal).await
        }
        .instrument(span)
        .await
    }

    /// Run passes for several objects concurrently.
    ///
    /// Results come back in input order.
    pub async fn reconcile_all<I>(&self, objs: I) -> Vec<(ObjectKey, ReconcileOutcome)>
    where
        I: IntoIterator<Item = O>,
    {
        let passes = objs.into_iter().map(|obj| async move {
            let key = obj.key();
            (key, self.reconcile(obj).await)
        });
        join_all(passes).await
    }

    async fn run_bounded(&self, ctx: &mut Context, state: &mut S) -> Signal {
        let deadline = ctx.deadline();
        let pass = self.action.run(ctx, state);
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, pass)
                .await
                .unwrap_or_else(|_| Signal::Propagate(PipelineError::DeadlineExceeded)),
            None => pass.await,
        }
    }

    async fn record(&self, key: &ObjectKey, signal: Signal) -> ReconcileOutcome {
        let failures = {
            let mut failures = self.failures.lock().await;
            if matches!(signal, Signal::Propagate(_)) {
                let count = failures.entry(key.clone()).or_insert(0);
                *count = count.saturating_add(1);
                *count
            } else {
                failures.remove(key);
                0
            }
        };

        let outcome = handle_signal(signal, &self.config, failures);
        match &outcome {
            ReconcileOutcome::Done => info!("Object converged"),
            ReconcileOutcome::Requeue { after } => {
                debug!(after_ms = after.as_millis(), "Requeue requested");
            }
            ReconcileOutcome::Failed { error, retry_after } => warn!(
                error = %error,
                failures,
                retryable = error.is_retryable(),
                retry_after_ms = retry_after.as_millis(),
                "Pass failed"
            ),
        }
        outcome
    }

    /// Consecutive failed passes for `key`.
    pub async fn failure_count(&self, key: &ObjectKey) -> u32 {
        self.failures.lock().await.get(key).copied().unwrap_or(0)
    }

    /// Objects whose last pass failed, sorted by key.
    pub async fn failing_objects(&self) -> Vec<ObjectKey> {
        self.failures.lock().await.keys().cloned().sorted().collect_vec()
    }

    /// Drop failure tracking for an object that no longer exists.
    pub async fn forget(&self, key: &ObjectKey) {
        self.failures.lock().await.remove(key);
    }

    /// The configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}
