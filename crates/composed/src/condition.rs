//! Status conditions keyed by condition type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

/// One observable aspect of an object's convergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub observed_generation: i64,
    /// Filled with the current time when a condition is first stored or its
    /// status changes, unless the caller supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Create a condition of `type_` with `status`.
    pub fn new(type_: impl Into<String>, status: impl Into<ConditionStatus>) -> Self {
        Self {
            type_: type_.into(),
            status: status.into(),
            reason: String::new(),
            message: String::new(),
            observed_generation: 0,
            last_transition_time: None,
        }
    }

    /// Set the reason code.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the generation this condition was computed from.
    #[must_use]
    pub const fn with_observed_generation(mut self, generation: i64) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Set an explicit transition time.
    #[must_use]
    pub const fn with_last_transition_time(mut self, at: DateTime<Utc>) -> Self {
        self.last_transition_time = Some(at);
        self
    }
}

/// Condition set with at most one entry per type.
///
/// Entries keep insertion order; deserializing input with repeated types keeps
/// the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Condition>", into = "Vec<Condition>")]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the condition of `type_`.
    pub fn find(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    /// Whether the condition of `type_` is present with status `True`.
    pub fn is_true(&self, type_: &str) -> bool {
        self.find(type_)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Whether the condition of `type_` is present with status `False`.
    pub fn is_false(&self, type_: &str) -> bool {
        self.find(type_)
            .is_some_and(|c| c.status == ConditionStatus::False)
    }

    /// Upsert `condition` by type. Returns true if anything changed.
    ///
    /// The transition time only moves when the status changes.
    pub fn set(&mut self, condition: Condition) -> bool {
        let Some(existing) = self.0.iter_mut().find(|c| c.type_ == condition.type_) else {
            let mut condition = condition;
            if condition.last_transition_time.is_none() {
                condition.last_transition_time = Some(Utc::now());
            }
            self.0.push(condition);
            return true;
        };

        let mut changed = false;
        if existing.status != condition.status {
            existing.status = condition.status;
            existing.last_transition_time =
                Some(condition.last_transition_time.unwrap_or_else(Utc::now));
            changed = true;
        }
        if existing.reason != condition.reason {
            existing.reason = condition.reason;
            changed = true;
        }
        if existing.message != condition.message {
            existing.message = condition.message;
            changed = true;
        }
        if existing.observed_generation != condition.observed_generation {
            existing.observed_generation = condition.observed_generation;
            changed = true;
        }
        changed
    }

    /// Remove the condition of `type_`. Returns true if one was removed.
    pub fn remove(&mut self, type_: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c.type_ != type_);
        self.0.len() != before
    }

    /// Condition types in order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.type_.as_str())
    }

    /// Iterate over conditions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.0.iter()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Condition>> for Conditions {
    fn from(conditions: Vec<Condition>) -> Self {
        let mut set = Self::new();
        for condition in conditions {
            set.remove(&condition.type_);
            set.0.push(condition);
        }
        set
    }
}

impl From<Conditions> for Vec<Condition> {
    fn from(conditions: Conditions) -> Self {
        conditions.0
    }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_set_appends_and_stamps_time() {
        let mut conditions = Conditions::new();
        assert!(conditions.set(Condition::new("Ready", true)));
        assert_eq!(conditions.len(), 1);
        assert!(conditions.find("Ready").unwrap().last_transition_time.is_some());
        assert!(conditions.is_true("Ready"));
    }

    #[test]
    fn test_set_replaces_by_type() {
        let mut conditions = Conditions::new();
        conditions.set(Condition::new("Ready", false).with_reason("Pending"));
        conditions.set(Condition::new("Ready", true).with_reason("Provisioned"));
        assert_eq!(conditions.len(), 1);
        let ready = conditions.find("Ready").unwrap();
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(ready.reason, "Provisioned");
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut conditions = Conditions::new();
        conditions.set(Condition::new("Ready", true).with_last_transition_time(at(100)));
        let changed = conditions.set(
            Condition::new("Ready", true)
                .with_message("still fine")
                .with_last_transition_time(at(200)),
        );
        assert!(changed);
        let ready = conditions.find("Ready").unwrap();
        assert_eq!(ready.last_transition_time, Some(at(100)));
        assert_eq!(ready.message, "still fine");
    }

    #[test]
    fn test_transition_time_moves_on_status_change() {
        let mut conditions = Conditions::new();
        conditions.set(Condition::new("Ready", true).with_last_transition_time(at(100)));
        conditions.set(Condition::new("Ready", false).with_last_transition_time(at(200)));
        assert_eq!(
            conditions.find("Ready").unwrap().last_transition_time,
            Some(at(200))
        );
    }

    #[test]
    fn test_identical_set_reports_no_change() {
        let mut conditions = Conditions::new();
        let cond = Condition::new("Ready", true).with_reason("Ok");
        conditions.set(cond.clone());
        let snapshot = conditions.clone();
        assert!(!conditions.set(cond));
        assert_eq!(conditions, snapshot);
    }

    #[test]
    fn test_remove() {
        let mut conditions: Conditions = vec![
            Condition::new("Ready", true),
            Condition::new("Overlap", true),
        ]
        .into();
        assert!(conditions.remove("Overlap"));
        assert!(!conditions.remove("Overlap"));
        assert_eq!(conditions.types().collect::<Vec<_>>(), vec!["Ready"]);
    }

    #[test]
    fn test_deserialize_dedups_and_uses_wire_names() {
        let json = r#"[
            {"type": "Ready", "status": "False", "reason": "A"},
            {"type": "Ready", "status": "True", "reason": "B", "observedGeneration": 3}
        ]"#;
        let conditions: Conditions = serde_json::from_str(json).unwrap();
        assert_eq!(conditions.len(), 1);
        let ready = conditions.find("Ready").unwrap();
        assert_eq!(ready.reason, "B");
        assert_eq!(ready.observed_generation, 3);

        let out = serde_json::to_value(&conditions).unwrap();
        assert_eq!(out[0]["type"], "Ready");
        assert_eq!(out[0]["observedGeneration"], 3);
    }
}
