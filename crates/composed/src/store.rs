//! Status persistence collaborator.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectKey};

/// Persists an object's status.
///
/// Implementations report optimistic-concurrency conflicts as errors instead
/// of resolving them; the next pass starts again from a fresh object.
#[async_trait]
pub trait StatusWriter<O: Object>: Send + Sync {
    /// Write `obj`'s status. On success the writer may refresh fields it owns,
    /// such as the resource version.
    async fn update_status(&self, ctx: &Context, obj: &mut O) -> Result<()>;
}

/// In-memory object store for testing.
///
/// Enforces resource-version checks on status writes and can be primed with
/// failures to exercise error paths.
pub struct InMemoryStatusStore<O: Object> {
    objects: RwLock<HashMap<ObjectKey, O>>,
    injected_failures: Mutex<VecDeque<Error>>,
    writes: Mutex<u64>,
}

impl<O: Object> Default for InMemoryStatusStore<O> {
    fn default() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            injected_failures: Mutex::new(VecDeque::new()),
            writes: Mutex::new(0),
        }
    }
}

impl<O: Object> InMemoryStatusStore<O> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an object.
    pub async fn insert(&self, obj: O) {
        self.objects.write().await.insert(obj.key(), obj);
    }

    /// Fetch a copy of an object.
    pub async fn get(&self, key: &ObjectKey) -> Option<O> {
        self.objects.read().await.get(key).cloned()
    }

    /// Remove an object.
    pub async fn remove(&self, key: &ObjectKey) -> Option<O> {
        self.objects.write().await.remove(key)
    }

    /// Make the next status write fail with `err`. Failures queue up.
    pub async fn fail_next(&self, err: Error) {
        self.injected_failures.lock().await.push_back(err);
    }

    /// Number of successful status writes.
    pub async fn write_count(&self) -> u64 {
        *self.writes.lock().await
    }
}

#[async_trait]
impl<O: Object> StatusWriter<O> for InMemoryStatusStore<O> {
    async fn update_status(&self, _ctx: &Context, obj: &mut O) -> Result<()> {
        if let Some(err) = self.injected_failures.lock().await.pop_front() {
            return Err(err);
        }

        let key = obj.key();
        let mut objects = self.objects.write().await;
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| Error::object_not_found(key.to_string()))?;

        let expected = stored.meta().resource_version;
        let actual = obj.meta().resource_version;
        if expected != actual {
            return Err(Error::conflict(key.to_string(), expected, actual));
        }

        let next = expected.saturating_add(1);
        obj.meta_mut().resource_version = next;
        *stored = obj.clone();

        let mut writes = self.writes.lock().await;
        *writes = writes.saturating_add(1);

        debug!(object = %key, resource_version = next, "Status persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::object::ObjectMeta;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        meta: ObjectMeta,
        note: String,
    }

    impl Object for Widget {
        fn kind(&self) -> &'static str {
            "Widget"
        }

        fn meta(&self) -> &ObjectMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut ObjectMeta {
            &mut self.meta
        }
    }

    fn widget() -> Widget {
        Widget {
            meta: ObjectMeta::new("default", "w1"),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn test_update_bumps_resource_version() {
        let store = InMemoryStatusStore::new();
        store.insert(widget()).await;

        let mut obj = widget();
        obj.note = "updated".to_string();
        let result = store.update_status(&Context::background(), &mut obj).await;
        assert!(result.is_ok());
        assert_eq!(obj.meta.resource_version, 1);

        let stored = store.get(&obj.key()).await.unwrap();
        assert_eq!(stored.note, "updated");
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_write_conflicts() {
        let store = InMemoryStatusStore::new();
        store.insert(widget()).await;

        let mut first = widget();
        let mut second = widget();
        assert!(store.update_status(&Context::background(), &mut first).await.is_ok());

        let result = store.update_status(&Context::background(), &mut second).await;
        assert_eq!(result, Err(Error::conflict("default/w1", 1, 0)));
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store: InMemoryStatusStore<Widget> = InMemoryStatusStore::new();
        let result = store
            .update_status(&Context::background(), &mut widget())
            .await;
        assert_eq!(result, Err(Error::object_not_found("default/w1")));
    }

    #[tokio::test]
    async fn test_injected_failure_consumed_once() {
        let store = InMemoryStatusStore::new();
        store.insert(widget()).await;
        store.fail_next(Error::status_update_failed("default/w1", "etcd timeout")).await;

        let mut obj = widget();
        assert!(store.update_status(&Context::background(), &mut obj).await.is_err());
        assert!(store.update_status(&Context::background(), &mut obj).await.is_ok());
    }
}
