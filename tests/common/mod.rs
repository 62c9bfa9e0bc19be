// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for integration tests.

use dynacfg::domain::{ConfigError, ConfigKey, ConfigValue, Result};
use dynacfg::ports::ConfigSource;
use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// A mock configuration source whose backing values can be edited between
/// refreshes.
///
/// Edits go to a pending map; `refresh` publishes the pending map, or fails and
/// keeps the published one when failure is switched on.
#[derive(Debug)]
pub struct MockConfigSource {
    name: String,
    priority: u8,
    pending: Mutex<HashMap<String, String>>,
    published: Mutex<HashMap<String, String>>,
    fail_refresh: AtomicBool,
    refreshes: AtomicUsize,
    delay_ms: AtomicU64,
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl MockConfigSource {
    /// Creates an empty mock source.
    pub fn new(name: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            priority,
            pending: Mutex::new(HashMap::new()),
            published: Mutex::new(HashMap::new()),
            fail_refresh: AtomicBool::new(false),
            refreshes: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Adds a value that is visible immediately.
    pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        self.pending.lock().unwrap().insert(key.clone(), value.clone());
        self.published.lock().unwrap().insert(key, value);
        self
    }

    /// Stages a value for the next refresh.
    pub fn stage(&self, key: impl Into<String>, value: impl Into<String>) {
        self.pending.lock().unwrap().insert(key.into(), value.into());
    }

    /// Stages a removal for the next refresh.
    pub fn stage_removal(&self, key: &str) {
        self.pending.lock().unwrap().remove(key);
    }

    /// Makes subsequent refreshes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail_refresh.store(failing, Ordering::SeqCst);
    }

    /// Number of refresh attempts so far.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Makes every refresh take at least `delay`.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of refreshes running right now.
    pub fn active_refreshes(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of refreshes ever seen running at once.
    pub fn peak_concurrent_refreshes(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ConfigSource for MockConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.published
            .lock()
            .unwrap()
            .get(key)
            .map(|v| ConfigValue::from(v.as_str()))
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        self.published
            .lock()
            .unwrap()
            .keys()
            .map(|k| ConfigKey::from(k.as_str()))
            .collect()
    }

    fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }

        let result = if self.fail_refresh.load(Ordering::SeqCst) {
            Err(ConfigError::source_error(&self.name, "simulated outage"))
        } else {
            let pending = self.pending.lock().unwrap().clone();
            *self.published.lock().unwrap() = pending;
            Ok(())
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Sets environment variables for the lifetime of the guard.
#[allow(dead_code)]
pub struct EnvGuard {
    keys: Vec<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    /// Creates an empty guard.
    pub fn new() -> Self {
        EnvGuard { keys: Vec::new() }
    }

    /// Sets a variable that is removed when the guard drops.
    pub fn set(&mut self, key: &str, value: &str) {
        env::set_var(key, value);
        self.keys.push(key.to_string());
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            env::remove_var(key);
        }
    }
}
