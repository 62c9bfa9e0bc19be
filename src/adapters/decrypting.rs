// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transparent decryption of marked values.

use crate::domain::{ConfigKey, ConfigValue, Result};
use crate::ports::{ConfigSource, SecretDecryptor};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Wraps a source and decrypts values carrying the decryptor's marker.
///
/// Unmarked values pass through untouched. A marked value that fails to decrypt
/// is treated as absent and a warning is logged; the ciphertext is never handed
/// to callers.
///
/// Name and priority are those of the wrapped source, so the wrapper can stand
/// in for it inside a composite.
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::{DecryptingSource, KeyValueStore};
/// use dynacfg::domain::Result;
/// use dynacfg::ports::{ConfigSource, SecretDecryptor};
/// use std::sync::Arc;
///
/// struct Reverse;
///
/// impl SecretDecryptor for Reverse {
///     fn decrypt(&self, ciphertext: &str) -> Result<String> {
///         Ok(ciphertext.chars().rev().collect())
///     }
/// }
///
/// let store = Arc::new(KeyValueStore::new("vault", 1));
/// store.put("db.password", "ENC(terces)").unwrap();
///
/// let source = DecryptingSource::new(store, Arc::new(Reverse));
/// assert_eq!(source.get_string("db.password").as_deref(), Some("secret"));
/// ```
pub struct DecryptingSource {
    inner: Arc<dyn ConfigSource>,
    decryptor: Arc<dyn SecretDecryptor>,
}

impl DecryptingSource {
    /// Wraps `inner`, decrypting its values with `decryptor`.
    pub fn new(inner: Arc<dyn ConfigSource>, decryptor: Arc<dyn SecretDecryptor>) -> Self {
        Self { inner, decryptor }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &Arc<dyn ConfigSource> {
        &self.inner
    }
}

impl fmt::Debug for DecryptingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptingSource")
            .field("inner", &self.inner.name())
            .finish_non_exhaustive()
    }
}

impl ConfigSource for DecryptingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn priority(&self) -> u8 {
        self.inner.priority()
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        let raw = self.inner.get(key)?;
        match self.decryptor.decrypt_if_needed(raw.as_str()) {
            Ok(plain) => Some(ConfigValue::new(plain)),
            Err(e) => {
                // Never log the value itself.
                tracing::warn!(
                    "Failed to decrypt '{}' from '{}': {}",
                    key,
                    self.inner.name(),
                    e
                );
                None
            }
        }
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        self.inner.all_keys()
    }

    fn refresh(&self) -> Result<()> {
        self.inner.refresh()
    }

    fn get_properties(&self, prefix: &str) -> HashMap<String, String> {
        self.inner
            .get_properties(prefix)
            .into_iter()
            .filter_map(|(rest, value)| match self.decryptor.decrypt_if_needed(&value) {
                Ok(plain) => Some((rest, plain)),
                Err(e) => {
                    tracing::warn!(
                        "Failed to decrypt '{}.{}' from '{}': {}",
                        prefix,
                        rest,
                        self.inner.name(),
                        e
                    );
                    None
                }
            })
            .collect()
    }
}
