// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dynamic configuration provider.
//!
//! This module ties the pieces together: a [`CompositeSource`] answers lookups,
//! a refresh cycle diffs the resolved view before and after refreshing the
//! sources, a [`ChangeNotifier`] delivers the resulting events, and a
//! [`RefreshScheduler`] can run the cycle in the background.

use crate::adapters::KeyValueStore;
use crate::domain::{
    diff_snapshots, ConfigChangeEvent, ConfigError, ConfigKey, ConfigValue, Result, Snapshot,
};
use crate::ports::{ConfigSource, ListenerResult};
use crate::service::{
    ChangeNotifier, CompositeSource, ListenerHandle, RefreshScheduler, RuleValidator,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// State shared with the background refresh thread.
struct ProviderCore {
    composite: CompositeSource,
    notifier: ChangeNotifier,
    /// Held for the duration of a refresh cycle
    refresh_guard: Mutex<()>,
    /// Thread running the current cycle, if any
    cycle_owner: Mutex<Option<ThreadId>>,
}

/// Clears the cycle owner when the cycle ends, even by unwinding.
struct OwnerReset<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for OwnerReset<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl ProviderCore {
    fn owns_cycle(&self) -> bool {
        *self.cycle_owner.lock().unwrap_or_else(|e| e.into_inner()) == Some(thread::current().id())
    }

    fn run_cycle(&self, _guard: MutexGuard<'_, ()>) -> Result<Vec<ConfigChangeEvent>> {
        *self.cycle_owner.lock().unwrap_or_else(|e| e.into_inner()) = Some(thread::current().id());
        let _reset = OwnerReset(&self.cycle_owner);

        let before = self.composite.snapshot();
        let outcome = self.composite.refresh();
        let after = self.composite.snapshot();

        let events = diff_snapshots(&before, &after);
        tracing::debug!(
            "Refresh resolved {} keys, {} changed",
            after.len(),
            events.len()
        );
        if !events.is_empty() {
            self.notifier.notify(&events);
        }

        // Events from the sources that did refresh are delivered even when
        // another source failed.
        outcome.map(|()| events)
    }

    fn refresh(&self) -> Result<Vec<ConfigChangeEvent>> {
        // A listener refreshing the provider it listens to would wait on itself.
        if self.owns_cycle() {
            return Err(ConfigError::invalid_argument(
                "refresh already in progress on this thread",
            ));
        }
        let guard = self
            .refresh_guard
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        self.run_cycle(guard)
    }

    fn tick(&self) {
        let guard = match self.refresh_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("Refresh still in progress; skipping scheduled tick");
                return;
            }
        };
        if let Err(e) = self.run_cycle(guard) {
            tracing::warn!("Scheduled refresh failed: {}", e);
        }
    }
}

/// Configuration access with change notification and optional periodic
/// refresh.
///
/// Lookups go straight to the composed sources and never block on a refresh.
/// [`refresh`](Self::refresh) re-reads every source, computes the change
/// events and hands them to the registered listeners before returning them.
/// Refresh cycles never overlap: an explicit `refresh` waits for a running
/// cycle, a scheduled tick that finds one running is skipped.
///
/// The provider also implements [`ConfigSource`], so it can be validated or
/// composed like any other source. Method-call syntax picks the inherent
/// `refresh`, which returns the events.
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::KeyValueStore;
/// use dynacfg::ports::ConfigSource;
/// use dynacfg::service::DynamicConfigProvider;
/// use std::sync::Arc;
///
/// # fn main() -> dynacfg::domain::Result<()> {
/// let store = Arc::new(KeyValueStore::new("app", 1));
/// store.put("pool.size", "10")?;
///
/// let provider = DynamicConfigProvider::builder()
///     .with_source(store.clone())
///     .build()?;
///
/// provider.add_listener("pool.size", |event| {
///     println!("{}", event);
///     Ok(())
/// });
///
/// assert!(provider.refresh()?.is_empty());
/// assert_eq!(provider.get_i32("pool.size"), Some(10));
/// # Ok(())
/// # }
/// ```
pub struct DynamicConfigProvider {
    core: Arc<ProviderCore>,
    scheduler: RefreshScheduler,
}

impl DynamicConfigProvider {
    /// Creates a provider over `composite`.
    pub fn new(composite: CompositeSource) -> Self {
        Self {
            core: Arc::new(ProviderCore {
                composite,
                notifier: ChangeNotifier::new(),
                refresh_guard: Mutex::new(()),
                cycle_owner: Mutex::new(None),
            }),
            scheduler: RefreshScheduler::new(),
        }
    }

    /// Creates a builder.
    pub fn builder() -> DynamicConfigProviderBuilder {
        DynamicConfigProviderBuilder::new()
    }

    /// The composed sources.
    pub fn composite(&self) -> &CompositeSource {
        &self.core.composite
    }

    /// The listener registry.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.core.notifier
    }

    /// Refreshes every source and notifies listeners of what changed.
    ///
    /// Returns the dispatched events. If some sources fail, the events caused
    /// by the others are still dispatched and
    /// [`ConfigError::RefreshFailed`](crate::domain::ConfigError::RefreshFailed)
    /// is returned; the failed sources keep serving their previous values.
    ///
    /// Called from a listener during a cycle, this fails with
    /// [`ConfigError::InvalidArgument`] instead of waiting on that cycle.
    pub fn refresh(&self) -> Result<Vec<ConfigChangeEvent>> {
        self.core.refresh()
    }

    /// The resolved value of every key, with the source that supplied it.
    pub fn snapshot(&self) -> Snapshot {
        self.core.composite.snapshot()
    }

    /// Registers a listener for changes to exactly `key`.
    pub fn add_listener<F>(&self, key: impl Into<String>, callback: F) -> ListenerHandle
    where
        F: Fn(&ConfigChangeEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.core.notifier.add_listener(key, callback)
    }

    /// Registers a listener for changes to any key.
    pub fn add_global_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ConfigChangeEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.core.notifier.add_global_listener(callback)
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        self.core.notifier.remove_listener(handle)
    }

    /// Refreshes in the background every `interval`.
    ///
    /// Calling this while auto refresh is already on changes the interval of
    /// the running task instead of starting another one.
    pub fn enable_auto_refresh(&self, interval: Duration) -> Result<()> {
        let core = Arc::clone(&self.core);
        self.scheduler
            .start(interval, Arc::new(move || core.tick()))
            .map(|_| ())
    }

    /// Stops background refresh.
    ///
    /// Once this returns no further cycle starts, except when called from a
    /// listener running on the refresh thread, where the current cycle finishes
    /// first. Returns `false` if auto refresh was not enabled.
    pub fn disable_auto_refresh(&self) -> bool {
        self.scheduler.stop()
    }

    /// Returns `true` while background refresh is on.
    pub fn is_auto_refresh_enabled(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Runs `validator` against the resolved configuration, failing with
    /// [`ConfigError::ValidationFailed`](crate::domain::ConfigError::ValidationFailed)
    /// if any rule fails.
    pub fn validate(&self, validator: &RuleValidator) -> Result<()> {
        validator.validate_or_fail(&self.core.composite)
    }
}

impl ConfigSource for DynamicConfigProvider {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn priority(&self) -> u8 {
        self.core.composite.priority()
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.core.composite.get(key)
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        self.core.composite.all_keys()
    }

    fn refresh(&self) -> Result<()> {
        DynamicConfigProvider::refresh(self).map(|_| ())
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.core.composite.get_i32(key)
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.core.composite.get_i64(key)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.core.composite.get_f64(key)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.core.composite.get_bool(key)
    }

    fn contains_key(&self, key: &str) -> bool {
        self.core.composite.contains_key(key)
    }

    fn get_properties(&self, prefix: &str) -> HashMap<String, String> {
        self.core.composite.get_properties(prefix)
    }

    fn snapshot(&self) -> Snapshot {
        self.core.composite.snapshot()
    }
}

impl std::fmt::Debug for DynamicConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicConfigProvider")
            .field("composite", &self.core.composite)
            .field("notifier", &self.core.notifier)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Builder for constructing a [`DynamicConfigProvider`].
///
/// Sources are queried by descending `priority()`; sources with equal priority
/// keep the order in which they were added.
///
/// # Examples
///
/// ```rust
/// use dynacfg::service::DynamicConfigProvider;
/// use std::collections::HashMap;
///
/// # fn main() -> dynacfg::domain::Result<()> {
/// let provider = DynamicConfigProvider::builder()
///     .with_env_prefix("MYAPP_")
///     .with_values("defaults", 0, HashMap::from([
///         ("server.port".to_string(), "8080".to_string()),
///     ]))?
///     .build()?;
///
/// assert_eq!(provider.composite().len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct DynamicConfigProviderBuilder {
    sources: Vec<Arc<dyn ConfigSource>>,
    auto_refresh: Option<Duration>,
}

impl DynamicConfigProviderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            auto_refresh: None,
        }
    }

    /// Adds a configuration source.
    pub fn with_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds environment variables as a configuration source.
    ///
    /// Keys are lowercased and underscores become dots, so `DATABASE_URL` is
    /// available as `database.url`.
    #[cfg(feature = "env")]
    pub fn with_env_vars(self) -> Self {
        use crate::adapters::EnvVarAdapter;
        self.with_source(Arc::new(EnvVarAdapter::new().lowercase_keys(true)))
    }

    /// Adds environment variables with a prefix as a configuration source.
    #[cfg(feature = "env")]
    pub fn with_env_prefix(self, prefix: impl Into<String>) -> Self {
        use crate::adapters::EnvVarAdapter;
        self.with_source(Arc::new(
            EnvVarAdapter::with_prefix(prefix).lowercase_keys(true),
        ))
    }

    /// Adds a YAML file as a configuration source.
    #[cfg(feature = "yaml")]
    pub fn with_yaml_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        use crate::adapters::YamlFileAdapter;
        let adapter = YamlFileAdapter::from_file(path)?;
        Ok(self.with_source(Arc::new(adapter)))
    }

    /// Adds a fixed set of values, such as defaults, as a configuration source.
    pub fn with_values(
        self,
        name: impl Into<String>,
        priority: u8,
        values: HashMap<String, String>,
    ) -> Result<Self> {
        let store = KeyValueStore::new(name, priority);
        store.replace_all(values)?;
        Ok(self.with_source(Arc::new(store)))
    }

    /// Starts background refresh with `interval` when the provider is built.
    pub fn auto_refresh(mut self, interval: Duration) -> Self {
        self.auto_refresh = Some(interval);
        self
    }

    /// Builds the provider.
    pub fn build(self) -> Result<DynamicConfigProvider> {
        let composite = self
            .sources
            .into_iter()
            .fold(CompositeSource::builder(), |builder, source| {
                builder.with_source(source)
            })
            .build();

        tracing::debug!("Built provider over {:?}", composite);
        let provider = DynamicConfigProvider::new(composite);
        if let Some(interval) = self.auto_refresh {
            provider.enable_auto_refresh(interval)?;
        }
        Ok(provider)
    }
}

impl Default for DynamicConfigProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
