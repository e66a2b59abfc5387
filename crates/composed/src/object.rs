//! Object model the engine reconciles.
//!
//! The engine does not know concrete resource schemas; it only needs the
//! metadata every cluster object carries and, for status updates, access to
//! the object's condition set.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::Conditions;

/// Namespaced name identifying an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace, empty for cluster-scoped objects.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Create a namespaced key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Metadata common to every reconciled object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub generation: i64,
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

impl ObjectMeta {
    /// Create metadata for a namespaced object.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// The object's key.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Whether deletion was requested.
    pub const fn is_marked_for_deletion(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Whether `finalizer` is present.
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Add `finalizer` if absent. Returns true if it was added.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Remove `finalizer` if present. Returns true if it was removed.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }
}

/// A reconciled object.
pub trait Object: Clone + fmt::Debug + Send + Sync + 'static {
    /// Kind name used in logs and error messages.
    fn kind(&self) -> &'static str;

    /// Object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Mutable object metadata.
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// The object's key.
    fn key(&self) -> ObjectKey {
        self.meta().key()
    }
}

/// An object whose status exposes a condition set.
pub trait ObjectWithConditions: Object {
    /// The status conditions.
    fn conditions(&self) -> &Conditions;

    /// Mutable status conditions.
    fn conditions_mut(&mut self) -> &mut Conditions;
}
