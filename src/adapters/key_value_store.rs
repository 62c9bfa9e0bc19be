// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory, thread-safe key-value store.
//!
//! The store is the leaf building block of every source in this crate. Its map
//! is held behind an [`ArcSwap`], so readers load the current map without
//! locking and every write publishes a whole new map.

use crate::domain::{ConfigError, ConfigKey, ConfigValue, Result};
use crate::ports::ConfigSource;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// An explicitly owned property map with copy-on-write updates.
///
/// `KeyValueStore` also implements [`ConfigSource`]; its `refresh` has nothing
/// to re-read and always succeeds.
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::KeyValueStore;
/// use dynacfg::ports::ConfigSource;
///
/// let store = KeyValueStore::new("defaults", 0);
/// store.put("pool.size", "10").unwrap();
///
/// assert_eq!(store.get_i32("pool.size"), Some(10));
/// assert!(store.put("", "x").is_err());
/// ```
#[derive(Debug)]
pub struct KeyValueStore {
    name: String,
    priority: u8,
    values: ArcSwap<HashMap<String, String>>,
}

impl KeyValueStore {
    /// Creates an empty store.
    pub fn new(name: impl Into<String>, priority: u8) -> Self {
        Self::with_values(name, priority, HashMap::new())
    }

    /// Creates a store holding `values`.
    pub fn with_values(
        name: impl Into<String>,
        priority: u8,
        values: HashMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            values: ArcSwap::from_pointee(values),
        }
    }

    /// Inserts or replaces one property.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = ConfigKey::parse(key)?.into_string();
        let value = value.into();
        self.values.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.clone(), value.clone());
            next
        });
        Ok(())
    }

    /// Removes one property, returning its previous value.
    pub fn remove(&self, key: &str) -> Option<String> {
        let mut removed = None;
        self.values.rcu(|current| {
            let mut next = HashMap::clone(current);
            removed = next.remove(key);
            next
        });
        removed
    }

    /// Atomically replaces every property.
    ///
    /// Readers observe either the complete old map or the complete new one.
    pub fn replace_all(&self, values: HashMap<String, String>) -> Result<()> {
        if values.keys().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::invalid_argument(format!(
                "Store '{}' cannot hold an empty key",
                self.name
            )));
        }
        self.values.store(Arc::new(values));
        Ok(())
    }

    /// Removes every property.
    pub fn clear(&self) {
        self.values.store(Arc::new(HashMap::new()));
    }

    /// Returns the current map without copying it.
    pub fn load(&self) -> Arc<HashMap<String, String>> {
        self.values.load_full()
    }

    /// Number of stored properties.
    pub fn len(&self) -> usize {
        self.values.load().len()
    }

    /// Returns `true` if the store holds no properties.
    pub fn is_empty(&self) -> bool {
        self.values.load().is_empty()
    }
}

impl ConfigSource for KeyValueStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values
            .load()
            .get(key)
            .map(|v| ConfigValue::from(v.as_str()))
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        self.values
            .load()
            .keys()
            .map(|k| ConfigKey::from(k.as_str()))
            .collect()
    }

    fn refresh(&self) -> Result<()> {
        Ok(())
    }

    fn get_properties(&self, prefix: &str) -> HashMap<String, String> {
        // Single load so the result comes from one consistent map.
        let values = self.values.load();
        values
            .iter()
            .filter_map(|(k, v)| {
                let rest = k.strip_prefix(prefix)?.strip_prefix('.')?;
                (!rest.is_empty()).then(|| (rest.to_string(), v.clone()))
            })
            .collect()
    }
}
