// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote configuration fetcher trait definition.
//!
//! Concrete backends (key-value services, service registries, HTTP endpoints)
//! live outside this crate. They plug in by implementing `ConfigFetcher`, and
//! [`FetchingSource`](crate::adapters::FetchingSource) turns any fetcher into a
//! refreshable `ConfigSource`.

use crate::domain::Result;
use std::collections::HashMap;

/// Loads a complete, flat key-value view from a backend.
///
/// `fetch` may block on I/O; it is only called from `refresh`, never from a
/// lookup. Timeouts are the fetcher's own responsibility.
///
/// # Examples
///
/// ```rust
/// use dynacfg::ports::ConfigFetcher;
/// use dynacfg::domain::Result;
/// use std::collections::HashMap;
///
/// struct Static;
///
/// impl ConfigFetcher for Static {
///     fn name(&self) -> &str {
///         "static"
///     }
///
///     fn fetch(&self) -> Result<HashMap<String, String>> {
///         Ok(HashMap::from([("feature.x".to_string(), "on".to_string())]))
///     }
/// }
/// ```
pub trait ConfigFetcher: Send + Sync {
    /// A short identifier for logs and change attribution.
    fn name(&self) -> &str;

    /// Returns every key the backend currently holds.
    fn fetch(&self) -> Result<HashMap<String, String>>;
}

/// A fetcher backed by a closure, handy for tests and small integrations.
pub struct FnFetcher<F> {
    name: String,
    fetch: F,
}

impl<F> FnFetcher<F>
where
    F: Fn() -> Result<HashMap<String, String>> + Send + Sync,
{
    /// Wraps `fetch` under the given name.
    pub fn new(name: impl Into<String>, fetch: F) -> Self {
        Self {
            name: name.into(),
            fetch,
        }
    }
}

impl<F> ConfigFetcher for FnFetcher<F>
where
    F: Fn() -> Result<HashMap<String, String>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<HashMap<String, String>> {
        (self.fetch)()
    }
}
