//! Per-pass reconciliation state.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;
use crate::object::Object;
use crate::store::StatusWriter;

/// Mutable state threaded through one reconciliation pass.
///
/// Exactly one value exists per pass; it is built from the freshly fetched
/// object and dropped when the pass returns.
#[async_trait]
pub trait State: Send {
    /// The reconciled object type.
    type Object: Object;

    /// The target object.
    fn obj(&self) -> &Self::Object;

    /// The target object, mutably.
    fn obj_mut(&mut self) -> &mut Self::Object;

    /// Intermediate results of earlier steps.
    fn bag(&self) -> &Bag;

    /// Intermediate results of earlier steps, mutably.
    fn bag_mut(&mut self) -> &mut Bag;

    /// Persist the object's current status.
    async fn update_obj_status(&mut self, ctx: &Context) -> Result<()>;
}

/// Keyed store of values produced by earlier steps.
#[derive(Default)]
pub struct Bag {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Bag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutable access to the value under `key`, if present and of type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Remove and return the value under `key` if it is of type `T`.
    ///
    /// A value of another type stays in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Whether anything is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Bag").field("keys", &keys).finish()
    }
}

/// General-purpose state: the object, a bag and the status writer.
///
/// Resource-specific states usually wrap this and delegate.
pub struct BaseState<O: Object> {
    obj: O,
    bag: Bag,
    writer: Arc<dyn StatusWriter<O>>,
}

impl<O: Object> BaseState<O> {
    /// Create state for `obj`, persisting through `writer`.
    pub fn new(obj: O, writer: Arc<dyn StatusWriter<O>>) -> Self {
        Self {
            obj,
            bag: Bag::new(),
            writer,
        }
    }

    /// Consume the state, returning the object.
    pub fn into_obj(self) -> O {
        self.obj
    }
}

impl<O: Object> fmt::Debug for BaseState<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseState")
            .field("obj", &self.obj)
            .field("bag", &self.bag)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<O: Object> State for BaseState<O> {
    type Object = O;

    fn obj(&self) -> &O {
        &self.obj
    }

    fn obj_mut(&mut self) -> &mut O {
        &mut self.obj
    }

    fn bag(&self) -> &Bag {
        &self.bag
    }

    fn bag_mut(&mut self) -> &mut Bag {
        &mut self.bag
    }

    async fn update_obj_status(&mut self, ctx: &Context) -> Result<()> {
        self.writer.update_status(ctx, &mut self.obj).await
    }
}
