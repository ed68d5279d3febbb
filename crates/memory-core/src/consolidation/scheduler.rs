//! Debounced consolidation scheduling.
//!
//! Consolidation is expensive (embedding comparisons, possible LLM calls for
//! promotion summaries) and most valuable once a burst of writes has
//! settled, not after every single one. `ConsolidationScheduler` tracks the
//! last-activity time and fires at most once per idle window, the same
//! debounce shape `decay::batch::LazyDecayBatchProcessor` uses for its
//! flush timer but triggered by idleness rather than a fixed interval.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::model::now_ms;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub idle_ms: i64,
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            idle_ms: 30_000,
            poll_interval_ms: 5_000,
        }
    }
}

pub struct ConsolidationScheduler {
    config: SchedulerConfig,
    last_activity_ms: AtomicI64,
    pending_run: AtomicBool,
    notify: Notify,
    stopped: AtomicBool,
    timer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConsolidationScheduler {
    pub fn new(config: SchedulerConfig) -> Arc<Self> {
        Arc::new(ConsolidationScheduler {
            config,
            last_activity_ms: AtomicI64::new(now_ms()),
            pending_run: AtomicBool::new(false),
            notify: Notify::new(),
            stopped: AtomicBool::new(false),
            timer: tokio::sync::Mutex::new(None),
        })
    }

    /// Call on every write that should reset the idle window.
    pub fn record_activity(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
        self.pending_run.store(true, Ordering::Relaxed);
    }

    /// True once `idle_ms` has elapsed since the last recorded activity and
    /// a run hasn't already been claimed via `take_due_run`.
    pub fn is_due(&self, now: i64) -> bool {
        self.pending_run.load(Ordering::Relaxed)
            && now.saturating_sub(self.last_activity_ms.load(Ordering::Relaxed)) >= self.config.idle_ms
    }

    /// Atomically claims a due run so a background poller and a manual
    /// caller can't both trigger consolidation for the same idle window.
    pub fn take_due_run(&self, now: i64) -> bool {
        if self.is_due(now) {
            self.pending_run.store(false, Ordering::Relaxed)
        } else {
            false
        }
    }

    /// Spawn a background task that polls `is_due` and invokes `on_due`
    /// when the idle window elapses. `self` must be held in an `Arc`.
    pub fn start<F, Fut>(self: &Arc<Self>, mut on_due: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(this.config.poll_interval_ms));
            loop {
                interval.tick().await;
                if this.stopped.load(Ordering::Relaxed) {
                    break;
                }
                let now = now_ms();
                if this.take_due_run(now) {
                    debug!("consolidation idle window elapsed, running scheduled pass");
                    on_due().await;
                    this.notify.notify_waiters();
                }
            }
        });
        if let Ok(mut slot) = self.timer.try_lock() {
            *slot = Some(handle);
        }
    }

    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_due_before_idle_window_elapses() {
        let scheduler = ConsolidationScheduler::new(SchedulerConfig {
            idle_ms: 1_000,
            poll_interval_ms: 100,
        });
        scheduler.record_activity();
        let now = now_ms();
        assert!(!scheduler.is_due(now + 500));
        assert!(scheduler.is_due(now + 1_500));
    }

    #[test]
    fn take_due_run_is_one_shot() {
        let scheduler = ConsolidationScheduler::new(SchedulerConfig {
            idle_ms: 0,
            poll_interval_ms: 100,
        });
        scheduler.record_activity();
        let now = now_ms() + 1;
        assert!(scheduler.take_due_run(now));
        assert!(!scheduler.take_due_run(now));
    }
}
