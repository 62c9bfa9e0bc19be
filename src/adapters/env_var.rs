// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment variable configuration source adapter.
//!
//! This module provides an adapter that reads configuration values from
//! environment variables.

use crate::domain::{ConfigKey, ConfigValue, Result};
use crate::ports::ConfigSource;
use arc_swap::ArcSwapOption;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

/// Maximum length for environment variable keys (prevents DoS)
const MAX_ENV_KEY_LEN: usize = 512;

/// Maximum length for environment variable values (prevents DoS)
const MAX_ENV_VALUE_LEN: usize = 1048576; // 1MB

/// Configuration source adapter for environment variables.
///
/// This adapter reads configuration values from environment variables. It supports
/// optional prefix filtering (e.g., only read variables starting with "APP_") and
/// key transformation (e.g., converting underscores to dots).
///
/// The environment is read lazily on first access and re-read by `refresh`.
///
/// # Priority
///
/// Environment variables have a priority of 2, which means they override
/// configuration files and remote sources (priority 1).
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::EnvVarAdapter;
///
/// // Read all environment variables
/// let adapter = EnvVarAdapter::new();
///
/// // Read only variables with a specific prefix, as lowercase dotted keys
/// let adapter = EnvVarAdapter::with_prefix("APP_").lowercase_keys(true);
/// ```
#[derive(Debug)]
pub struct EnvVarAdapter {
    /// Optional prefix to filter environment variables
    prefix: Option<String>,
    /// Whether to convert keys to lowercase
    lowercase_keys: bool,
    /// Whether to replace underscores with dots
    replace_underscores: bool,
    /// Values supplied directly instead of read from the process
    fixed: Option<HashMap<String, String>>,
    /// Loaded variables, swapped whole on refresh
    cache: ArcSwapOption<HashMap<String, String>>,
}

impl EnvVarAdapter {
    /// Creates a new environment variable adapter without prefix filtering.
    pub fn new() -> Self {
        Self {
            prefix: None,
            lowercase_keys: false,
            replace_underscores: true,
            fixed: None,
            cache: ArcSwapOption::empty(),
        }
    }

    /// Creates a new environment variable adapter with prefix filtering.
    ///
    /// Only environment variables starting with the given prefix will be read.
    /// The prefix is stripped from the key when storing values.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Sets whether to convert keys to lowercase.
    pub fn lowercase_keys(mut self, enabled: bool) -> Self {
        self.lowercase_keys = enabled;
        self
    }

    /// Sets whether to replace underscores with dots in keys (default on).
    pub fn replace_underscores(mut self, enabled: bool) -> Self {
        self.replace_underscores = enabled;
        self
    }

    /// Creates an adapter with pre-populated values for testing.
    ///
    /// **Note**: This method is primarily intended for testing. The values are
    /// used verbatim as keys and `refresh` keeps them.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dynacfg::adapters::EnvVarAdapter;
    /// use dynacfg::ports::ConfigSource;
    /// use std::collections::HashMap;
    ///
    /// let mut values = HashMap::new();
    /// values.insert("test.key".to_string(), "test_value".to_string());
    ///
    /// let adapter = EnvVarAdapter::with_values(values);
    /// assert_eq!(adapter.get_string("test.key").as_deref(), Some("test_value"));
    /// ```
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self {
            prefix: None,
            lowercase_keys: false,
            replace_underscores: false,
            fixed: Some(values),
            cache: ArcSwapOption::empty(),
        }
    }

    /// Maps a raw variable name to a configuration key, or `None` to skip it.
    fn transform_key(&self, key: &str) -> Option<String> {
        let key = match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str())?,
            None => key,
        };

        let mut transformed = key.to_string();
        if self.lowercase_keys {
            transformed = transformed.to_lowercase();
        }
        if self.replace_underscores {
            transformed = transformed.replace('_', ".");
        }

        (!transformed.trim().is_empty()).then_some(transformed)
    }

    /// Reads the environment into a new map.
    fn load(&self) -> HashMap<String, String> {
        if let Some(fixed) = &self.fixed {
            return fixed.clone();
        }

        let mut values = HashMap::new();
        for (key, value) in env::vars() {
            if key.len() > MAX_ENV_KEY_LEN || value.len() > MAX_ENV_VALUE_LEN {
                tracing::debug!(
                    "Skipping oversized environment variable: key_len={}, value_len={} (max key={}, max value={})",
                    key.len(),
                    value.len(),
                    MAX_ENV_KEY_LEN,
                    MAX_ENV_VALUE_LEN
                );
                continue;
            }

            if let Some(transformed) = self.transform_key(&key) {
                values.insert(transformed, value);
            }
        }

        tracing::debug!(
            "Loaded {} environment variables (prefix={:?}, lowercase={}, replace_underscores={})",
            values.len(),
            self.prefix,
            self.lowercase_keys,
            self.replace_underscores
        );

        values
    }

    /// Returns the loaded map, reading the environment on first use.
    fn values(&self) -> Arc<HashMap<String, String>> {
        if let Some(values) = self.cache.load_full() {
            return values;
        }
        let loaded = Arc::new(self.load());
        // A concurrent first access may have stored already; either map is a
        // complete read of the environment.
        self.cache
            .rcu(|current| current.clone().or_else(|| Some(Arc::clone(&loaded))));
        self.cache.load_full().unwrap_or(loaded)
    }
}

impl Default for EnvVarAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvVarAdapter {
    fn name(&self) -> &str {
        "env"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values().get(key).map(|v| ConfigValue::from(v.as_str()))
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        self.values()
            .keys()
            .map(|k| ConfigKey::from(k.as_str()))
            .collect()
    }

    fn refresh(&self) -> Result<()> {
        self.cache.store(Some(Arc::new(self.load())));
        Ok(())
    }
}
