// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-interval background task runner.
//!
//! The scheduler owns at most one thread. The thread waits on a control channel
//! with a timeout equal to the interval; a timeout is a tick, a message either
//! changes the interval or stops the loop.

use crate::domain::{ConfigError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Work run on every tick.
pub type ScheduledTask = Arc<dyn Fn() + Send + Sync>;

enum Control {
    SetInterval(Duration),
    Stop,
}

struct Running {
    control: Sender<Control>,
    thread: JoinHandle<()>,
    interval: Duration,
}

/// Runs a task every `interval` on a dedicated thread.
///
/// Starting an already running scheduler does not spawn a second thread; it
/// changes the interval of the existing one, and the next tick is counted from
/// that moment. Stopping waits for the thread to exit, so no tick starts after
/// `stop` returns. A tick that is already running is not interrupted.
///
/// # Examples
///
/// ```rust
/// use dynacfg::service::RefreshScheduler;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&ticks);
///
/// let scheduler = RefreshScheduler::new();
/// scheduler
///     .start(Duration::from_secs(60), Arc::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }))
///     .unwrap();
/// assert!(scheduler.is_running());
///
/// assert!(scheduler.stop());
/// assert!(!scheduler.stop());
/// ```
pub struct RefreshScheduler {
    name: String,
    running: Mutex<Option<Running>>,
}

impl RefreshScheduler {
    /// Creates a stopped scheduler.
    pub fn new() -> Self {
        Self::named("dynacfg-refresh")
    }

    /// Creates a stopped scheduler whose thread carries `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<Running>> {
        // The guarded state stays consistent even if a holder panicked.
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts running `task` every `interval`.
    ///
    /// Returns `Ok(true)` if a thread was started and `Ok(false)` if the
    /// scheduler was already running, in which case only the interval changes
    /// and `task` is dropped.
    pub fn start(&self, interval: Duration, task: ScheduledTask) -> Result<bool> {
        if interval.is_zero() {
            return Err(ConfigError::invalid_argument(
                "Refresh interval must be greater than zero",
            ));
        }

        let mut state = self.state();

        if let Some(running) = state.as_mut() {
            if running.interval != interval
                && running.control.send(Control::SetInterval(interval)).is_ok()
            {
                tracing::info!(
                    "Refresh interval changed from {:?} to {:?}",
                    running.interval,
                    interval
                );
                running.interval = interval;
            }
            return Ok(false);
        }

        let (control, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(interval, receiver, task))?;

        tracing::info!("Auto refresh started with interval {:?}", interval);
        *state = Some(Running {
            control,
            thread,
            interval,
        });
        Ok(true)
    }

    /// Stops the thread and waits for it to exit.
    ///
    /// Returns `false` if the scheduler was not running. When called from the
    /// scheduled task itself the thread is told to stop but not joined; it exits
    /// once the current tick returns.
    pub fn stop(&self) -> bool {
        let running = self.state().take();
        let Some(running) = running else {
            return false;
        };

        // A send error means the thread already exited.
        let _ = running.control.send(Control::Stop);

        if running.thread.thread().id() == thread::current().id() {
            tracing::debug!("Auto refresh stopped from its own thread");
        } else if running.thread.join().is_err() {
            tracing::warn!("Auto refresh thread exited abnormally");
        }

        tracing::info!("Auto refresh stopped");
        true
    }

    /// Returns `true` while a thread is scheduled.
    pub fn is_running(&self) -> bool {
        self.state().is_some()
    }

    /// The current interval, if running.
    pub fn interval(&self) -> Option<Duration> {
        self.state().as_ref().map(|running| running.interval)
    }
}

fn run(mut interval: Duration, receiver: mpsc::Receiver<Control>, task: ScheduledTask) {
    let mut next_tick = Instant::now() + interval;
    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(wait) {
            Ok(Control::SetInterval(updated)) => {
                interval = updated;
                next_tick = Instant::now() + interval;
            }
            Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if panic::catch_unwind(AssertUnwindSafe(|| task())).is_err() {
                    tracing::warn!("Scheduled refresh panicked; continuing");
                }
                next_tick = Instant::now() + interval;
            }
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("name", &self.name)
            .field("interval", &self.interval())
            .finish()
    }
}
