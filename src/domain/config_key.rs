// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration key newtype for dot-segmented property names.
//!
//! Keys such as `database.pool.size` are namespaces made of segments separated
//! by `.`. The `ConfigKey` type carries that structure so prefix scoping
//! (`database.pool` → `size`) lives in one place.

use crate::domain::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '.';

/// A type-safe wrapper for configuration keys.
///
/// # Examples
///
/// ```
/// use dynacfg::domain::config_key::ConfigKey;
///
/// let key = ConfigKey::from("database.pool.size");
/// assert_eq!(key.segments().collect::<Vec<_>>(), vec!["database", "pool", "size"]);
/// assert_eq!(key.strip_prefix("database"), Some("pool.size"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Creates a new `ConfigKey` from a `String` without validation.
    pub fn new(key: String) -> Self {
        ConfigKey(key)
    }

    /// Creates a `ConfigKey`, rejecting empty or blank keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynacfg::domain::config_key::ConfigKey;
    ///
    /// assert!(ConfigKey::parse("app.name").is_ok());
    /// assert!(ConfigKey::parse("   ").is_err());
    /// ```
    pub fn parse(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::invalid_argument(
                "Configuration keys must not be empty",
            ));
        }
        Ok(ConfigKey(key))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the `ConfigKey` into its inner `String`.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Iterates over the dot-separated segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_SEPARATOR)
    }

    /// Returns the remainder of the key below `prefix`.
    ///
    /// Matching is segment-aware: `db.pool` is below `db`, but `dbx.pool` is not.
    /// A key equal to the prefix itself has no remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
            .filter(|rest| !rest.is_empty())
    }

    /// Returns `true` if this key lives below `prefix`.
    pub fn is_under(&self, prefix: &str) -> bool {
        self.strip_prefix(prefix).is_some()
    }
}

impl From<String> for ConfigKey {
    fn from(s: String) -> Self {
        ConfigKey(s)
    }
}

impl From<&str> for ConfigKey {
    fn from(s: &str) -> Self {
        ConfigKey(s.to_string())
    }
}

impl From<ConfigKey> for String {
    fn from(key: ConfigKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ConfigKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ConfigKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
