// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change listener registry and dispatch.

use crate::domain::ConfigChangeEvent;
use crate::ports::{ChangeCallback, ListenerResult};
use arc_swap::ArcSwap;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one listener registration; pass it to
/// [`ChangeNotifier::remove_listener`] to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    /// Numeric id of the registration.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Outcome of one [`ChangeNotifier::notify`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listener invocations that returned `Ok`
    pub delivered: usize,
    /// Listener invocations that returned an error or panicked
    pub failed: usize,
}

impl DispatchReport {
    /// Total number of listener invocations.
    pub fn invocations(&self) -> usize {
        self.delivered + self.failed
    }

    /// Returns `true` if no listener failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

struct Registration {
    handle: ListenerHandle,
    /// `None` for listeners that observe every key
    key: Option<String>,
    callback: ChangeCallback,
}

/// Registry of change listeners.
///
/// For every event, listeners registered for the event's exact key run first,
/// then global listeners, each group in registration order. A listener that
/// returns an error or panics is logged and skipped; the remaining listeners
/// still run.
///
/// Registrations are replaced copy-on-write and `notify` iterates over the list
/// as it was when dispatch began, so a callback may add or remove listeners
/// without deadlocking. Such changes take effect from the next `notify` call.
///
/// # Examples
///
/// ```rust
/// use dynacfg::domain::ConfigChangeEvent;
/// use dynacfg::service::ChangeNotifier;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let notifier = ChangeNotifier::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// let handle = notifier.add_listener("pool.size", move |_event| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// let event = ConfigChangeEvent::between("pool.size", None, Some("10".into()), "env").unwrap();
/// let report = notifier.notify(&[event]);
/// assert_eq!(report.delivered, 1);
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
///
/// assert!(notifier.remove_listener(handle));
/// ```
pub struct ChangeNotifier {
    next_id: AtomicU64,
    registrations: ArcSwap<Vec<Arc<Registration>>>,
}

impl ChangeNotifier {
    /// Creates a notifier with no listeners.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            registrations: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Registers a listener for changes to exactly `key`.
    pub fn add_listener<F>(&self, key: impl Into<String>, callback: F) -> ListenerHandle
    where
        F: Fn(&ConfigChangeEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.register(Some(key.into()), Arc::new(callback))
    }

    /// Registers a listener for changes to any key.
    pub fn add_global_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ConfigChangeEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.register(None, Arc::new(callback))
    }

    /// Registers an already shared callback. `key = None` observes every key.
    pub fn add_callback(&self, key: Option<String>, callback: ChangeCallback) -> ListenerHandle {
        self.register(key, callback)
    }

    fn register(&self, key: Option<String>, callback: ChangeCallback) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            handle,
            key,
            callback,
        });
        self.registrations.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&registration));
            next
        });
        tracing::debug!(
            "Registered listener {} for {}",
            handle.0,
            registration.key.as_deref().unwrap_or("<all keys>")
        );
        handle
    }

    /// Unregisters a listener. Returns `false` if the handle was not registered.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut removed = false;
        self.registrations.rcu(|current| {
            let next: Vec<_> = current
                .iter()
                .filter(|r| r.handle != handle)
                .cloned()
                .collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.registrations.load().len()
    }

    /// Delivers `events`, in order, to the matching listeners.
    pub fn notify(&self, events: &[ConfigChangeEvent]) -> DispatchReport {
        let registrations = self.registrations.load_full();
        let mut report = DispatchReport::default();
        if registrations.is_empty() {
            return report;
        }

        for event in events {
            let exact = registrations
                .iter()
                .filter(|r| r.key.as_deref() == Some(event.key()));
            let global = registrations.iter().filter(|r| r.key.is_none());

            for registration in exact.chain(global) {
                if invoke(registration, event) {
                    report.delivered += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            "Dispatched {} change events: {} delivered, {} failed",
            events.len(),
            report.delivered,
            report.failed
        );
        report
    }
}

fn invoke(registration: &Registration, event: &ConfigChangeEvent) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| (registration.callback)(event))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(
                "Listener {} failed on change to '{}': {}",
                registration.handle.0,
                event.key(),
                e
            );
            false
        }
        Err(payload) => {
            tracing::warn!(
                "Listener {} panicked on change to '{}': {}",
                registration.handle.0,
                event.key(),
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
