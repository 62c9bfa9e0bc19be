// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration source trait definition.
//!
//! This module defines the `ConfigSource` trait, the primary port for anything
//! that can answer configuration lookups: in-memory stores, environment
//! variables, files, remote backends and composites of all of these.

use crate::domain::{ConfigError, ConfigKey, ConfigValue, ResolvedProperty, Result, Snapshot};
use std::collections::HashMap;

/// A trait for configuration sources.
///
/// Implementors provide raw string lookups, key enumeration and an explicit
/// `refresh`. The typed getters are provided on top of `get` and never fail:
/// a missing key and a value that does not parse as the requested type both
/// yield `None`.
///
/// # Thread Safety
///
/// Sources are shared between request threads and a background refresh task,
/// so implementations must be `Send + Sync`, and `refresh` takes `&self`.
/// Implementations must swap their state atomically so a concurrent reader sees
/// either the old or the new values, and a failed refresh must leave the old
/// values in place.
///
/// # Examples
///
/// ```rust
/// use dynacfg::ports::ConfigSource;
/// use dynacfg::domain::{ConfigKey, ConfigValue, Result};
///
/// struct Fixed;
///
/// impl ConfigSource for Fixed {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     fn priority(&self) -> u8 {
///         1
///     }
///
///     fn get(&self, key: &str) -> Option<ConfigValue> {
///         (key == "pool.size").then(|| ConfigValue::from("10"))
///     }
///
///     fn all_keys(&self) -> Vec<ConfigKey> {
///         vec![ConfigKey::from("pool.size")]
///     }
///
///     fn refresh(&self) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// let source = Fixed;
/// assert_eq!(source.get_i32("pool.size"), Some(10));
/// assert_eq!(source.get_bool("pool.size"), None);
/// assert!(!source.contains_key("pool.max"));
/// ```
pub trait ConfigSource: Send + Sync {
    /// Returns the name of this configuration source.
    ///
    /// Used for logging, change attribution and error messages, e.g. "env",
    /// "yaml-file", "composite".
    fn name(&self) -> &str;

    /// Returns the priority of this configuration source.
    ///
    /// Builders that order sources automatically place higher values first.
    /// The built-in adapters use 2 for environment variables and 1 for files
    /// and remote sources.
    fn priority(&self) -> u8;

    /// Retrieves the raw value for `key`, if present.
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// Returns all configuration keys available in this source.
    fn all_keys(&self) -> Vec<ConfigKey>;

    /// Re-reads the backing store.
    ///
    /// On failure the previously resolved values must remain visible.
    fn refresh(&self) -> Result<()>;

    /// Returns the value as a string.
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(String::from)
    }

    /// Returns the value parsed as an `i32`.
    fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.as_i32())
    }

    /// Returns the value parsed as an `i64`.
    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    /// Returns the value parsed as an `f64`.
    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    /// Returns the value parsed as a boolean (see [`ConfigValue::as_bool`]).
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Retrieves a value that must be present.
    ///
    /// Fails with [`ConfigError::ConfigKeyNotFound`] when it is not.
    fn require(&self, key: &str) -> Result<ConfigValue> {
        self.get(key).ok_or_else(|| ConfigError::ConfigKeyNotFound {
            key: key.to_string(),
        })
    }

    /// Returns `true` if the key is present.
    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns every property below `prefix`, with the prefix stripped.
    ///
    /// For `prefix = "database"`, the key `database.pool.size` is returned as
    /// `pool.size`. The key `database` itself and keys such as `databases.x`
    /// are not included.
    fn get_properties(&self, prefix: &str) -> HashMap<String, String> {
        self.all_keys()
            .into_iter()
            .filter_map(|key| {
                let rest = key.strip_prefix(prefix)?.to_string();
                let value = self.get(key.as_str())?;
                Some((rest, value.into()))
            })
            .collect()
    }

    /// Captures every key with its value, attributed to this source.
    fn snapshot(&self) -> Snapshot {
        self.all_keys()
            .into_iter()
            .filter_map(|key| {
                let value = self.get(key.as_str())?;
                Some((
                    key.into_string(),
                    ResolvedProperty::new(String::from(value), self.name()),
                ))
            })
            .collect()
    }
}
