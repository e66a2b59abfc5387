//! Branch predicates over the pass state.
//!
//! Predicates must be side-effect free and total. That is a contract on the
//! implementor; nothing here can enforce it.

use std::sync::Arc;

use crate::context::Context;
use crate::object::Object;
use crate::state::State;

/// A pure boolean test over the state.
pub trait Predicate<S>: Send + Sync {
    /// Evaluate the predicate.
    fn test(&self, ctx: &Context, state: &S) -> bool;
}

impl<S, F> Predicate<S> for F
where
    F: Fn(&Context, &S) -> bool + Send + Sync,
{
    fn test(&self, ctx: &Context, state: &S) -> bool {
        self(ctx, state)
    }
}

/// Shared, type-erased predicate.
pub type PredicateRef<S> = Arc<dyn Predicate<S>>;

/// True when the object has a deletion timestamp.
pub fn marked_for_deletion<S: State>(_ctx: &Context, state: &S) -> bool {
    state.obj().meta().is_marked_for_deletion()
}

/// Negate a predicate.
pub fn not<S: 'static>(predicate: PredicateRef<S>) -> PredicateRef<S> {
    Arc::new(move |ctx: &Context, state: &S| !predicate.test(ctx, state))
}

/// True when every predicate holds. Vacuously true when empty.
pub fn all<S: 'static>(predicates: Vec<PredicateRef<S>>) -> PredicateRef<S> {
    Arc::new(move |ctx: &Context, state: &S| predicates.iter().all(|p| p.test(ctx, state)))
}

/// True when any predicate holds. False when empty.
pub fn any<S: 'static>(predicates: Vec<PredicateRef<S>>) -> PredicateRef<S> {
    Arc::new(move |ctx: &Context, state: &S| predicates.iter().any(|p| p.test(ctx, state)))
}
