// SPDX-License-Identifier: MIT OR Apache-2.0

//! Priority-ordered composition of configuration sources.
//!
//! A [`CompositeSource`] answers every query by asking its sources in order and
//! returning the first present value. It is itself a [`ConfigSource`], so it
//! can be wrapped, validated or nested like any other source.

use crate::domain::{ConfigError, ConfigKey, ConfigValue, Result, Snapshot};
use crate::ports::ConfigSource;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// A configuration source that queries several underlying sources in a fixed
/// priority order.
///
/// The composite shares its sources through `Arc`; it does not own them
/// exclusively, so the same source may also be held and mutated elsewhere.
///
/// # Refresh
///
/// `refresh` refreshes every source, even after one has failed. Sources that
/// succeed keep their new state; if any source fails the whole call returns
/// [`ConfigError::RefreshFailed`] naming the stale sources.
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::KeyValueStore;
/// use dynacfg::ports::ConfigSource;
/// use dynacfg::service::CompositeSource;
/// use std::sync::Arc;
///
/// let overrides = Arc::new(KeyValueStore::new("overrides", 2));
/// let defaults = Arc::new(KeyValueStore::new("defaults", 1));
/// defaults.put("pool.size", "10").unwrap();
///
/// let composite = CompositeSource::new(vec![overrides.clone(), defaults]);
/// assert_eq!(composite.get_i32("pool.size"), Some(10));
///
/// overrides.put("pool.size", "25").unwrap();
/// assert_eq!(composite.get_i32("pool.size"), Some(25));
/// ```
#[derive(Clone)]
pub struct CompositeSource {
    /// Sources in query order, highest priority first
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl CompositeSource {
    /// Creates a composite that queries `sources` in the given order.
    ///
    /// The first source has the highest priority; the `priority()` values of
    /// the sources are not consulted.
    pub fn new(sources: Vec<Arc<dyn ConfigSource>>) -> Self {
        Self { sources }
    }

    /// Creates a builder that orders sources by their `priority()`.
    pub fn builder() -> CompositeSourceBuilder {
        CompositeSourceBuilder::new()
    }

    /// The composed sources, highest priority first.
    pub fn sources(&self) -> &[Arc<dyn ConfigSource>] {
        &self.sources
    }

    /// Number of composed sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if nothing has been composed.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for CompositeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSource")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ConfigSource for CompositeSource {
    fn name(&self) -> &str {
        "composite"
    }

    fn priority(&self) -> u8 {
        self.sources.iter().map(|s| s.priority()).max().unwrap_or(0)
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.sources.iter().find_map(|source| source.get(key))
    }

    // Typed lookups fall through to the next source when a value does not
    // parse as the requested type.

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.sources.iter().find_map(|source| source.get_i32(key))
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.sources.iter().find_map(|source| source.get_i64(key))
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.sources.iter().find_map(|source| source.get_f64(key))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.sources.iter().find_map(|source| source.get_bool(key))
    }

    fn contains_key(&self, key: &str) -> bool {
        self.sources.iter().any(|source| source.contains_key(key))
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        let keys: BTreeSet<ConfigKey> = self
            .sources
            .iter()
            .flat_map(|source| source.all_keys())
            .collect();
        keys.into_iter().collect()
    }

    fn refresh(&self) -> Result<()> {
        let mut failed_sources = Vec::new();
        let mut errors = Vec::new();

        for source in &self.sources {
            if let Err(e) = source.refresh() {
                tracing::warn!("Failed to refresh source '{}': {}", source.name(), e);
                failed_sources.push(source.name().to_string());
                errors.push(e);
            }
        }

        if failed_sources.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::RefreshFailed {
                failed_sources,
                errors,
            })
        }
    }

    fn get_properties(&self, prefix: &str) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for source in &self.sources {
            for (key, value) in source.get_properties(prefix) {
                merged.entry(key).or_insert(value);
            }
        }
        merged
    }

    fn snapshot(&self) -> Snapshot {
        let mut merged = Snapshot::new();
        for source in &self.sources {
            for (key, property) in source.snapshot() {
                merged.entry(key).or_insert(property);
            }
        }
        merged
    }
}

/// Builder for a [`CompositeSource`] ordered by source priority.
///
/// Higher `priority()` values are queried first. Sources with equal priority
/// keep the order in which they were added.
#[derive(Default)]
pub struct CompositeSourceBuilder {
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl CompositeSourceBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source.
    pub fn with_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Builds the composite.
    pub fn build(mut self) -> CompositeSource {
        // sort_by_key is stable, so ties keep insertion order
        self.sources
            .sort_by_key(|source| std::cmp::Reverse(source.priority()));
        CompositeSource::new(self.sources)
    }
}
