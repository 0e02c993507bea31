//! Cancellable scheduled tasks on the tokio runtime.
//!
//! Two shapes are provided: a trailing-edge [`Debouncer`] and a fixed-period
//! [`spawn_interval`]. Both hand out handles that abort their task when
//! dropped, so tearing down the owner tears down the timer.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest period [`spawn_interval`] accepts; tokio rejects a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Owned handle to a spawned task; aborts the task on drop.
#[derive(Debug)]
pub struct TaskHandle {
    // ---
    handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    // ---
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Lets the task run to completion on its own.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

// ============================================================
// Debouncer
// ============================================================

/// The one pending (not yet fired) debounced task.
struct Pending {
    generation: u64,
    task: TaskHandle,
}

/// Trailing-edge debounce.
///
/// Every [`schedule`](Debouncer::schedule) cancels the pending action, if
/// any, and starts a fresh quiet period. Once the period elapses the action
/// detaches from the debouncer before running, so a later `schedule` or
/// [`cancel`](Debouncer::cancel) never aborts work that is already in flight.
pub struct Debouncer {
    // ---
    delay: Duration,
    pending: Arc<Mutex<Option<Pending>>>,
    generation: AtomicU64,
}

impl Debouncer {
    // ---
    pub fn new(delay: Duration) -> Self {
        // ---
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action` to run after the quiet period, replacing whatever
    /// was pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = self.delay;
        let slot = Arc::clone(&self.pending);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            tracing::debug!("Rescheduling debounced task {}", previous.generation);
            // dropping `previous` aborts it
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = slot.lock().unwrap_or_else(PoisonError::into_inner);
                match pending.as_ref() {
                    Some(p) if p.generation == generation => {
                        // Detach without aborting ourselves.
                        if let Some(fired) = pending.take() {
                            fired.task.detach();
                        }
                    }
                    // Superseded between waking and taking the lock.
                    _ => return,
                }
            }
            action().await;
        });

        *pending = Some(Pending {
            generation,
            task: TaskHandle::new(handle),
        });
    }

    /// Cancels the pending action, if any. In-flight actions are unaffected.
    pub fn cancel(&self) {
        // ---
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(p) = pending.take() {
            tracing::debug!("Cancelled debounced task {}", p.generation);
        }
    }

    /// True while an action is waiting out its quiet period.
    pub fn is_pending(&self) -> bool {
        // ---
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================
// Fixed interval
// ============================================================

/// Runs `tick` every `period`, starting one full period from now.
///
/// `tick` returns `false` to stop the interval from inside. Missed ticks are
/// delayed, never bursted. A zero `period` is raised to one millisecond.
pub fn spawn_interval<F, Fut>(period: Duration, mut tick: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    // ---
    if period < MIN_PERIOD {
        tracing::warn!("Interval period {:?} too short; using {:?}", period, MIN_PERIOD);
    }
    let period = period.max(MIN_PERIOD);

    let handle = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !tick().await {
                break;
            }
        }
    });

    TaskHandle::new(handle)
}
