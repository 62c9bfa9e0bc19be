// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration change events and snapshot diffing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use time::OffsetDateTime;

/// Kind of difference detected for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// The key did not exist before and exists now.
    Added,
    /// The key existed before and now holds a different value.
    Updated,
    /// The key existed before and no longer exists.
    Removed,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Updated => write!(f, "UPDATED"),
            Self::Removed => write!(f, "REMOVED"),
        }
    }
}

/// A resolved value together with the name of the source that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProperty {
    /// The winning value
    pub value: String,
    /// Name of the source that supplied the value
    pub source: String,
}

impl ResolvedProperty {
    /// Creates a resolved property.
    pub fn new(value: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: source.into(),
        }
    }
}

/// Every key known to a set of sources, resolved by precedence.
pub type Snapshot = HashMap<String, ResolvedProperty>;

/// A detected difference between two successive snapshots for one key.
///
/// The constructor enforces the event invariant: `Added` has only a new value,
/// `Removed` has only an old value, `Updated` has two different values. A pair
/// of equal values produces no event at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChangeEvent {
    key: String,
    old_value: Option<String>,
    new_value: Option<String>,
    change_type: ChangeType,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    source: String,
}

impl ConfigChangeEvent {
    /// Builds an event from the old and new values of `key`.
    ///
    /// Returns `None` when both sides are absent or equal.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynacfg::domain::{ChangeType, ConfigChangeEvent};
    ///
    /// let event = ConfigChangeEvent::between("pool.size", None, Some("10".into()), "yaml-file").unwrap();
    /// assert_eq!(event.change_type(), ChangeType::Added);
    ///
    /// assert!(ConfigChangeEvent::between("pool.size", Some("10".into()), Some("10".into()), "env").is_none());
    /// ```
    pub fn between(
        key: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
        source: impl Into<String>,
    ) -> Option<Self> {
        let change_type = match (&old_value, &new_value) {
            (None, Some(_)) => ChangeType::Added,
            (Some(_), None) => ChangeType::Removed,
            (Some(old), Some(new)) if old != new => ChangeType::Updated,
            _ => return None,
        };

        Some(Self {
            key: key.into(),
            old_value,
            new_value,
            change_type,
            timestamp: OffsetDateTime::now_utc(),
            source: source.into(),
        })
    }

    /// The key that changed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value before the change, if the key existed.
    pub fn old_value(&self) -> Option<&str> {
        self.old_value.as_deref()
    }

    /// The value after the change, if the key still exists.
    pub fn new_value(&self) -> Option<&str> {
        self.new_value.as_deref()
    }

    /// The kind of change.
    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    /// When the change was detected.
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Name of the source that supplied the new value (or the old one, for removals).
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for ConfigChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} -> {}) from {}",
            self.change_type,
            self.key,
            self.old_value.as_deref().unwrap_or("<absent>"),
            self.new_value.as_deref().unwrap_or("<absent>"),
            self.source
        )
    }
}

/// Computes the change events between two snapshots.
///
/// Every key present in either snapshot is considered once; unchanged keys are
/// skipped. Events are ordered by key.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> Vec<ConfigChangeEvent> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let before = old.get(key);
            let after = new.get(key);
            let source = after.or(before).map(|p| p.source.as_str()).unwrap_or("");
            ConfigChangeEvent::between(
                key.as_str(),
                before.map(|p| p.value.clone()),
                after.map(|p| p.value.clone()),
                source,
            )
        })
        .collect()
}
