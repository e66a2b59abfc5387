//! Composable reconcile pipelines for declarative controllers.
//!
//! A reconcile pass is expressed as a tree of [`Action`]s instead of one
//! large function. Every action reports a [`Signal`] telling the pipeline
//! whether to keep going or how the pass should end:
//!
//! - **Sequence**: [`compose_actions`] runs steps in order and stops at the
//!   first non-continue signal.
//! - **Switch**: [`build_switch_action`] picks exactly one pipeline by the
//!   first matching [`Predicate`], falling back to a default.
//! - **Status**: [`UpdateStatus`] reconciles the object's condition set and
//!   persists it, mapping the outcome to a signal.
//!
//! Steps share data only through the [`State`] passed down the pipeline, so
//! each one can be re-run from scratch on the next pass.
//!
//! # Example
//!
//! ```ignore
//! use converge_composed::{
//!     build_switch_action, compose_actions, marked_for_deletion, sync_action_fn,
//!     BaseState, Case, Condition, Context, UpdateStatus, CONTINUE,
//! };
//! use std::sync::Arc;
//!
//! let active = compose_actions(
//!     "active",
//!     vec![
//!         sync_action_fn("add_finalizer", |_ctx, state: &mut BaseState<IpRange>| {
//!             state.obj_mut().meta_mut().add_finalizer("ipam.example.io/finalizer");
//!             CONTINUE
//!         }),
//!         UpdateStatus::new()
//!             .set_condition(Condition::new("Ready", true).with_reason("Provisioned"))
//!             .build()?
//!             .into_ref(),
//!     ],
//! );
//!
//! let machine = build_switch_action(
//!     "ip_range",
//!     Some(active),
//!     vec![Case::new(Arc::new(marked_for_deletion), delete_pipeline)],
//! );
//!
//! let signal = machine.run(&mut Context::background(), &mut state).await;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod action;
pub mod compose;
pub mod condition;
pub mod context;
pub mod error;
pub mod object;
pub mod predicate;
pub mod signal;
pub mod state;
pub mod store;
pub mod switch;
pub mod update_status;

// Re-export main types
pub use action::{
    action_fn, sync_action_fn, Action, ActionRef, ContinueAction, FnAction, StopAndForgetAction,
    StopWithRequeueAction, SyncFnAction,
};
pub use compose::{compose_actions, Sequence};
pub use condition::{Condition, ConditionStatus, Conditions};
pub use context::{CancelHandle, Context, Fields};
pub use error::{Error, Result};
pub use object::{Object, ObjectKey, ObjectMeta, ObjectWithConditions};
pub use predicate::{all, any, marked_for_deletion, not, Predicate, PredicateRef};
pub use signal::{
    log_error_and_return, Signal, SignalKind, CONTINUE, STOP_AND_FORGET, STOP_WITH_REQUEUE,
};
pub use state::{BaseState, Bag, State};
pub use store::{InMemoryStatusStore, StatusWriter};
pub use switch::{build_switch_action, if_else, Case, Switch};
pub use update_status::{
    ConditionRetention, ErrorWrapper, OnUpdateError, OnUpdateSuccess, UpdateStatus,
    UpdateStatusAction,
};
