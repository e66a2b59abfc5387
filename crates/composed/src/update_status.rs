//! Condition-set reconciliation followed by a status write.
//!
//! [`UpdateStatus`] collects options; [`UpdateStatus::build`] validates them
//! and fills defaults, producing an immutable [`UpdateStatusAction`]. Running
//! the action:
//!
//! 1. removes every condition type not on the keep-list (unless all
//!    conditions are kept),
//! 2. upserts each configured condition by type,
//! 3. persists the status through the state,
//! 4. maps the outcome to a signal through the error or success hook.
//!
//! By default a failed write is logged and requeued, a successful one ends
//! the pass.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::action::{Action, ActionRef};
use crate::condition::Condition;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectWithConditions};
use crate::signal::{log_error_and_return, Signal, STOP_AND_FORGET, STOP_WITH_REQUEUE};
use crate::state::State;

/// Maps a persistence error before it reaches the error hook.
pub type ErrorWrapper = Arc<dyn Fn(Error) -> Error + Send + Sync>;

/// Decides the signal after a failed status write.
pub type OnUpdateError = Arc<dyn Fn(&mut Context, Error) -> Signal + Send + Sync>;

/// Decides the signal after a successful status write.
pub type OnUpdateSuccess = Arc<dyn Fn(&mut Context) -> Signal + Send + Sync>;

/// What happens to existing conditions that are not being set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionRetention {
    /// Drop every condition type not listed.
    RemoveAllExcept(BTreeSet<String>),
    /// Leave existing conditions alone.
    KeepAll,
}

impl Default for ConditionRetention {
    fn default() -> Self {
        Self::RemoveAllExcept(BTreeSet::new())
    }
}

/// Options for a status update.
#[derive(Default)]
#[must_use]
pub struct UpdateStatus {
    conditions_to_set: Vec<Condition>,
    conditions_to_keep: BTreeSet<String>,
    remove_except_requested: bool,
    keep_all_requested: bool,
    error_log_message: Option<String>,
    error_wrapper: Option<ErrorWrapper>,
    on_update_error: Option<OnUpdateError>,
    on_update_success: Option<OnUpdateSuccess>,
    failed_signal: Option<Signal>,
    success_signal: Option<Signal>,
}

impl UpdateStatus {
    /// Start with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert `condition`. Later calls for the same type win.
    pub fn set_condition(mut self, condition: Condition) -> Self {
        self.conditions_to_set.push(condition);
        self
    }

    /// Upsert several conditions in order.
    pub fn set_conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions_to_set.extend(conditions);
        self
    }

    /// Keep these condition types and drop every other one not being set.
    ///
    /// This is the default retention with an empty keep-list. Calls
    /// accumulate.
    pub fn remove_all_conditions_except<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.remove_except_requested = true;
        self.conditions_to_keep
            .extend(types.into_iter().map(Into::into));
        self
    }

    /// Leave all existing conditions untouched; only upsert.
    pub fn keep_all_conditions(mut self) -> Self {
        self.keep_all_requested = true;
        self
    }

    /// Message logged by the default error hook.
    pub fn error_log_message(mut self, msg: impl Into<String>) -> Self {
        self.error_log_message = Some(msg.into());
        self
    }

    /// Transform the persistence error before the error hook sees it.
    pub fn update_error_wrapper(
        mut self,
        wrapper: impl Fn(Error) -> Error + Send + Sync + 'static,
    ) -> Self {
        self.error_wrapper = Some(Arc::new(wrapper));
        self
    }

    /// Replace the error hook.
    pub fn on_update_error(
        mut self,
        hook: impl Fn(&mut Context, Error) -> Signal + Send + Sync + 'static,
    ) -> Self {
        self.on_update_error = Some(Arc::new(hook));
        self
    }

    /// Replace the success hook.
    pub fn on_update_success(
        mut self,
        hook: impl Fn(&mut Context) -> Signal + Send + Sync + 'static,
    ) -> Self {
        self.on_update_success = Some(Arc::new(hook));
        self
    }

    /// Signal returned by the default error hook.
    pub fn failed_signal(mut self, signal: Signal) -> Self {
        self.failed_signal = Some(signal);
        self
    }

    /// Signal returned by the default success hook.
    pub fn success_signal(mut self, signal: Signal) -> Self {
        self.success_signal = Some(signal);
        self
    }

    /// Validate the options and apply defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when both
    /// [`keep_all_conditions`](Self::keep_all_conditions) and
    /// [`remove_all_conditions_except`](Self::remove_all_conditions_except)
    /// were requested.
    pub fn build(self) -> Result<UpdateStatusAction> {
        if self.keep_all_requested && self.remove_except_requested {
            return Err(Error::invalid_config(
                "keep_all_conditions and remove_all_conditions_except are mutually exclusive",
            ));
        }

        let retention = if self.keep_all_requested {
            ConditionRetention::KeepAll
        } else {
            ConditionRetention::RemoveAllExcept(self.conditions_to_keep)
        };

        Ok(UpdateStatusAction {
            conditions_to_set: self.conditions_to_set,
            retention,
            error_log_message: self.error_log_message,
            error_wrapper: self.error_wrapper.unwrap_or_else(|| Arc::new(|err| err)),
            on_update_error: self.on_update_error,
            on_update_success: self.on_update_success,
            failed_signal: self.failed_signal.unwrap_or(STOP_WITH_REQUEUE),
            success_signal: self.success_signal.unwrap_or(STOP_AND_FORGET),
        })
    }

    /// Build, then run against `state`.
    ///
    /// A configuration error is logged and propagated.
    pub async fn run<S>(self, ctx: &mut Context, state: &mut S) -> Signal
    where
        S: State,
        S::Object: ObjectWithConditions,
    {
        match self.build() {
            Ok(action) => action.apply(ctx, state).await,
            Err(err) => {
                let signal = Signal::Propagate(err.clone());
                log_error_and_return(ctx, &err, "Invalid status update", signal)
            }
        }
    }
}

/// A validated status update, reusable across passes.
pub struct UpdateStatusAction {
    conditions_to_set: Vec<Condition>,
    retention: ConditionRetention,
    error_log_message: Option<String>,
    error_wrapper: ErrorWrapper,
    on_update_error: Option<OnUpdateError>,
    on_update_success: Option<OnUpdateSuccess>,
    failed_signal: Signal,
    success_signal: Signal,
}

impl fmt::Debug for UpdateStatusAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateStatusAction")
            .field("conditions_to_set", &self.conditions_to_set)
            .field("retention", &self.retention)
            .field("failed_signal", &self.failed_signal)
            .field("success_signal", &self.success_signal)
            .finish_non_exhaustive()
    }
}

impl UpdateStatusAction {
    /// The retention policy in effect.
    pub const fn retention(&self) -> &ConditionRetention {
        &self.retention
    }

    /// Share as an action for any state whose object has conditions.
    pub fn into_ref<S>(self) -> ActionRef<S>
    where
        S: State,
        S::Object: ObjectWithConditions,
    {
        Arc::new(self)
    }

    fn sets_type(&self, type_: &str) -> bool {
        self.conditions_to_set.iter().any(|c| c.type_ == type_)
    }

    /// Reconcile the condition set, persist it and map the outcome.
    ///
    /// Types about to be set are never treated as stale, so their transition
    /// time survives a rerun with an unchanged status.
    pub async fn apply<S>(&self, ctx: &mut Context, state: &mut S) -> Signal
    where
        S: State,
        S::Object: ObjectWithConditions,
    {
        let obj = state.obj_mut();

        if let ConditionRetention::RemoveAllExcept(keep) = &self.retention {
            let stale: Vec<String> = obj
                .conditions()
                .types()
                .filter(|t| !keep.contains(*t) && !self.sets_type(t))
                .map(str::to_string)
                .collect();
            for type_ in &stale {
                obj.conditions_mut().remove(type_);
            }
            if !stale.is_empty() {
                debug!(object = %obj.key(), removed = ?stale, "Removed stale conditions");
            }
        }

        for condition in &self.conditions_to_set {
            obj.conditions_mut().set(condition.clone());
        }

        let kind = obj.kind();
        match state.update_obj_status(ctx).await {
            Err(err) => {
                let err = (self.error_wrapper)(err);
                match &self.on_update_error {
                    Some(hook) => hook(ctx, err),
                    None => {
                        let msg = self
                            .error_log_message
                            .clone()
                            .unwrap_or_else(|| format!("Error updating status for {kind}"));
                        log_error_and_return(ctx, &err, &msg, self.failed_signal.clone())
                    }
                }
            }
            Ok(()) => match &self.on_update_success {
                Some(hook) => hook(ctx),
                None => self.success_signal.clone(),
            },
        }
    }
}

#[async_trait]
impl<S> Action<S> for UpdateStatusAction
where
    S: State,
    S::Object: ObjectWithConditions,
{
    async fn run(&self, ctx: &mut Context, state: &mut S) -> Signal {
        self.apply(ctx, state).await
    }

    fn name(&self) -> &str {
        "updateStatus"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::condition::{ConditionStatus, Conditions};
    use crate::object::ObjectMeta;
    use crate::state::BaseState;
    use crate::store::InMemoryStatusStore;

    #[derive(Debug, Clone, PartialEq)]
    struct Range {
        meta: ObjectMeta,
        conditions: Conditions,
    }

    impl Object for Range {
        fn kind(&self) -> &'static str {
            "IpRange"
        }

        fn meta(&self) -> &ObjectMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut ObjectMeta {
            &mut self.meta
        }
    }

    impl ObjectWithConditions for Range {
        fn conditions(&self) -> &Conditions {
            &self.conditions
        }

        fn conditions_mut(&mut self) -> &mut Conditions {
            &mut self.conditions
        }
    }

    fn range_with(types: &[&str]) -> Range {
        Range {
            meta: ObjectMeta::new("kcp", "range-a"),
            conditions: types
                .iter()
                .map(|t| Condition::new(*t, true).with_reason("Existing"))
                .collect(),
        }
    }

    async fn state_for(obj: Range) -> (BaseState<Range>, Arc<InMemoryStatusStore<Range>>) {
        let store = Arc::new(InMemoryStatusStore::new());
        store.insert(obj.clone()).await;
        (BaseState::new(obj, store.clone()), store)
    }

    fn ready() -> Condition {
        Condition::new("Ready", true).with_reason("Provisioned")
    }

    #[tokio::test]
    async fn test_default_removes_unlisted_conditions() {
        let (mut state, store) = state_for(range_with(&["Ready", "Overlap"])).await;
        let signal = UpdateStatus::new()
            .remove_all_conditions_except(["Ready"])
            .set_condition(ready())
            .run(&mut Context::background(), &mut state)
            .await;

        assert_eq!(signal, STOP_AND_FORGET);
        let stored = store.get(&state.obj().key()).await.unwrap();
        assert!(stored.conditions.find("Overlap").is_none());
        assert_eq!(stored.conditions.find("Ready").unwrap().reason, "Provisioned");
    }

    #[tokio::test]
    async fn test_default_with_empty_keep_list_leaves_only_set_conditions() {
        let (mut state, _) = state_for(range_with(&["Ready", "Overlap", "Error"])).await;
        let _ = UpdateStatus::new()
            .set_condition(Condition::new("Error", true).with_reason("CidrOverlap"))
            .run(&mut Context::background(), &mut state)
            .await;
        let types: Vec<&str> = state.obj().conditions.types().collect();
        assert_eq!(types, vec!["Error"]);
    }

    #[tokio::test]
    async fn test_keep_all_leaves_existing_conditions() {
        let original = range_with(&["A", "B"]);
        let (mut state, _) = state_for(original.clone()).await;
        let signal = UpdateStatus::new()
            .keep_all_conditions()
            .run(&mut Context::background(), &mut state)
            .await;

        assert_eq!(signal, STOP_AND_FORGET);
        assert_eq!(state.obj().conditions, original.conditions);
    }

    #[tokio::test]
    async fn test_run_twice_is_idempotent() {
        let (mut state, _) = state_for(range_with(&["Ready", "Overlap"])).await;
        let action = UpdateStatus::new()
            .remove_all_conditions_except(["Ready"])
            .set_condition(ready())
            .set_condition(Condition::new("Ready", ConditionStatus::True).with_reason("Provisioned"))
            .build()
            .unwrap();

        let _ = action.apply(&mut Context::background(), &mut state).await;
        let first = state.obj().conditions.clone();
        let _ = action.apply(&mut Context::background(), &mut state).await;

        assert_eq!(state.obj().conditions, first);
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn test_default_policy_rerun_keeps_transition_time() {
        let (mut state, _) = state_for(range_with(&[])).await;
        let action = UpdateStatus::new().set_condition(ready()).build().unwrap();

        let _ = action.apply(&mut Context::background(), &mut state).await;
        let first = state.obj().conditions.find("Ready").unwrap().last_transition_time;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _ = action.apply(&mut Context::background(), &mut state).await;
        let second = state.obj().conditions.find("Ready").unwrap().last_transition_time;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(state.obj().conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_requeues_and_wraps_once() {
        let (mut state, store) = state_for(range_with(&["Ready"])).await;
        store
            .fail_next(Error::status_update_failed("kcp/range-a", "apiserver unavailable"))
            .await;

        let wrapped = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wrapped);
        let signal = UpdateStatus::new()
            .set_condition(ready())
            .update_error_wrapper(move |err| {
                counter.fetch_add(1, Ordering::SeqCst);
                err.wrap("updating ready condition")
            })
            .run(&mut Context::background(), &mut state)
            .await;

        assert_eq!(signal, STOP_WITH_REQUEUE);
        assert_eq!(wrapped.load(Ordering::SeqCst), 1);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_error_hook_receives_wrapped_error() {
        let (mut state, store) = state_for(range_with(&[])).await;
        store.fail_next(Error::conflict("kcp/range-a", 2, 1)).await;

        let signal = UpdateStatus::new()
            .update_error_wrapper(|err| err.wrap("status"))
            .on_update_error(|_ctx, err| Signal::Propagate(err))
            .run(&mut Context::background(), &mut state)
            .await;

        let err = signal.error().cloned().unwrap();
        assert_eq!(err.root_cause(), &Error::conflict("kcp/range-a", 2, 1));
        assert!(err.to_string().starts_with("status: "));
    }

    #[tokio::test]
    async fn test_custom_signals() {
        let (mut state, store) = state_for(range_with(&[])).await;
        let signal = UpdateStatus::new()
            .success_signal(crate::signal::CONTINUE)
            .run(&mut Context::background(), &mut state)
            .await;
        assert_eq!(signal, crate::signal::CONTINUE);

        store.fail_next(Error::status_update_failed("kcp/range-a", "x")).await;
        let delay = Signal::requeue_after(Duration::from_secs(10));
        let signal = UpdateStatus::new()
            .failed_signal(delay.clone())
            .error_log_message("Error updating IpRange status with overlap condition")
            .run(&mut Context::background(), &mut state)
            .await;
        assert_eq!(signal, delay);
    }

    #[tokio::test]
    async fn test_success_hook_can_replace_context() {
        let (mut state, _) = state_for(range_with(&[])).await;
        let mut ctx = Context::background();
        let signal = UpdateStatus::new()
            .on_update_success(|ctx| {
                *ctx = ctx.clone().with_value("status", "persisted");
                crate::signal::CONTINUE
            })
            .run(&mut ctx, &mut state)
            .await;
        assert!(signal.is_continue());
        assert_eq!(ctx.fields().get("status"), Some("persisted"));
    }

    #[tokio::test]
    async fn test_conflicting_retention_is_rejected() {
        let built = UpdateStatus::new()
            .keep_all_conditions()
            .remove_all_conditions_except(["Ready"])
            .build();
        assert!(matches!(built, Err(Error::InvalidConfig { .. })));

        let (mut state, store) = state_for(range_with(&["Ready"])).await;
        let signal = UpdateStatus::new()
            .remove_all_conditions_except(["Ready"])
            .keep_all_conditions()
            .run(&mut Context::background(), &mut state)
            .await;
        assert!(matches!(signal, Signal::Propagate(Error::InvalidConfig { .. })));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_built_action_reused_as_pipeline_step() {
        let step: ActionRef<BaseState<Range>> = UpdateStatus::new()
            .set_condition(ready())
            .build()
            .unwrap()
            .into_ref();
        assert_eq!(step.name(), "updateStatus");

        let (mut state, store) = state_for(range_with(&["Overlap"])).await;
        let signal = step.run(&mut Context::background(), &mut state).await;
        assert_eq!(signal, STOP_AND_FORGET);
        assert_eq!(store.write_count().await, 1);
        assert!(state.obj().conditions.is_true("Ready"));
    }

    #[test]
    fn test_retention_defaults() {
        let action = UpdateStatus::new().build().unwrap();
        assert_eq!(action.retention(), &ConditionRetention::default());
        let action = UpdateStatus::new().keep_all_conditions().build().unwrap();
        assert_eq!(action.retention(), &ConditionRetention::KeepAll);
    }
}
