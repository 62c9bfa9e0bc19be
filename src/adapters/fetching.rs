// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refreshable source over a remote [`ConfigFetcher`].

use crate::adapters::KeyValueStore;
use crate::domain::{ConfigError, ConfigKey, ConfigValue, Result};
use crate::ports::{ConfigFetcher, ConfigSource};
use std::collections::HashMap;

/// Configuration source adapter for remote backends.
///
/// Values are served from a local [`KeyValueStore`]; `refresh` asks the fetcher
/// for a complete new view and swaps it in only when the fetch succeeds, so a
/// backend outage leaves the last good values available.
///
/// # Priority
///
/// Remote sources have a default priority of 1, but this can be customized.
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::FetchingSource;
/// use dynacfg::ports::{ConfigSource, FnFetcher};
/// use std::collections::HashMap;
///
/// # fn main() -> dynacfg::domain::Result<()> {
/// let fetcher = FnFetcher::new("kv", || {
///     Ok(HashMap::from([("db.pool.size".to_string(), "20".to_string())]))
/// });
/// let source = FetchingSource::new(fetcher)?;
/// assert_eq!(source.get_i32("db.pool.size"), Some(20));
/// # Ok(())
/// # }
/// ```
pub struct FetchingSource<F> {
    fetcher: F,
    store: KeyValueStore,
}

impl<F: ConfigFetcher> FetchingSource<F> {
    /// Creates the source and performs the initial fetch.
    pub fn new(fetcher: F) -> Result<Self> {
        Self::with_priority(fetcher, 1)
    }

    /// Creates the source with a custom priority and performs the initial fetch.
    pub fn with_priority(fetcher: F, priority: u8) -> Result<Self> {
        let source = Self::deferred(fetcher, priority);
        source.refresh()?;
        Ok(source)
    }

    /// Creates the source without fetching; it stays empty until the first
    /// successful `refresh`.
    pub fn deferred(fetcher: F, priority: u8) -> Self {
        let store = KeyValueStore::new(fetcher.name(), priority);
        Self { fetcher, store }
    }

    /// The wrapped fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

impl<F: ConfigFetcher> ConfigSource for FetchingSource<F> {
    fn name(&self) -> &str {
        self.store.name()
    }

    fn priority(&self) -> u8 {
        self.store.priority()
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.store.get(key)
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        self.store.all_keys()
    }

    fn refresh(&self) -> Result<()> {
        let fetched = self.fetcher.fetch().map_err(|e| {
            tracing::warn!(
                "Fetch from '{}' failed, keeping {} previous values: {}",
                self.name(),
                self.store.len(),
                e
            );
            match e {
                err @ ConfigError::SourceError { .. } => err,
                other => ConfigError::SourceError {
                    source_name: self.name().to_string(),
                    message: "Failed to fetch configuration".to_string(),
                    source: Some(Box::new(other)),
                },
            }
        })?;

        tracing::debug!("Fetched {} values from '{}'", fetched.len(), self.name());
        self.store.replace_all(fetched)
    }

    fn get_properties(&self, prefix: &str) -> HashMap<String, String> {
        self.store.get_properties(prefix)
    }
}
