//! Write-coalescing batch processor
//!
//! Collects decay updates produced by recall and flushes them in bounded
//! chunks so a burst of reads never turns into a burst of individual
//! writes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::provider::{BatchWriteOutcome, MemoryUpdate, StorageProvider};

#[derive(Debug, Clone)]
pub struct LazyDecayBatchProcessorConfig {
    pub max_pending: usize,
    pub max_batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for LazyDecayBatchProcessorConfig {
    fn default() -> Self {
        LazyDecayBatchProcessorConfig {
            max_pending: 10_000,
            max_batch_size: 100,
            flush_interval_ms: 5_000,
        }
    }
}

/// Aggregated failure report from a `flush_now` call. A `BatchError` never
/// means the whole flush was lost — every chunk that succeeded already
/// landed in storage; this only names what didn't.
#[derive(Debug, Default)]
pub struct BatchError {
    pub failed: Vec<(String, String)>,
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of the flushed updates failed to persist", self.failed.len())
    }
}

impl std::error::Error for BatchError {}

struct PendingState {
    map: HashMap<String, MemoryUpdate>,
    /// Tracks first-insertion order so overflow evicts the oldest entry,
    /// not an arbitrary one. Entries for keys already merged into `map`
    /// are not re-pushed.
    order: VecDeque<String>,
}

impl PendingState {
    fn new() -> Self {
        PendingState {
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

/// Coalesces [`MemoryUpdate`]s keyed by `memory_id` and flushes them to a
/// [`StorageProvider`] in bounded chunks, either on a timer or on demand.
pub struct LazyDecayBatchProcessor {
    provider: Arc<dyn StorageProvider>,
    config: LazyDecayBatchProcessorConfig,
    pending: Mutex<PendingState>,
    /// Held for the duration of swap+chunk+write so two concurrent flushes
    /// cannot interleave writes for the same id (at-most-one flush in
    /// flight).
    flush_lock: Mutex<()>,
    stopped: AtomicBool,
    eviction_count: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl LazyDecayBatchProcessor {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Arc<Self> {
        Self::with_config(provider, LazyDecayBatchProcessorConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn StorageProvider>,
        config: LazyDecayBatchProcessorConfig,
    ) -> Arc<Self> {
        Arc::new(LazyDecayBatchProcessor {
            provider,
            config,
            pending: Mutex::new(PendingState::new()),
            flush_lock: Mutex::new(()),
            stopped: AtomicBool::new(false),
            eviction_count: AtomicU64::new(0),
            timer: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &LazyDecayBatchProcessorConfig {
        &self.config
    }

    /// Number of updates dropped on overflow since construction. Overflow
    /// is logged as a warning with this counter, never propagated to
    /// callers.
    pub fn eviction_count(&self) -> u64 {
        self.eviction_count.load(Ordering::Relaxed)
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.map.len()
    }

    /// Start the background flush timer. `self` must be held in an `Arc`
    /// (see [`LazyDecayBatchProcessor::new`]) so the spawned task can share
    /// ownership.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                this.config.flush_interval_ms,
            ));
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                interval.tick().await;
                if this.stopped.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(err) = this.flush_now().await {
                    error!(failures = err.failed.len(), "periodic decay flush had failures");
                }
            }
        });
        // best-effort: if a timer is already running we just leak the new
        // handle's task ownership into the old slot's drop, which aborts
        // nothing — callers are expected to call start() at most once.
        if let Ok(mut slot) = self.timer.try_lock() {
            *slot = Some(handle);
        }
    }

    /// Coalesce `update` into the pending buffer.
    ///
    /// Safe under concurrent callers. Newest-wins merge: `access_count`
    /// takes the max seen so far, while `resonance`/`last_accessed_at` are
    /// taken from whichever update observed the later `last_accessed_at`.
    pub async fn add(&self, update: MemoryUpdate) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }
        let mut state = self.pending.lock().await;
        let is_new = !state.map.contains_key(&update.memory_id);
        let id = update.memory_id.clone();
        match state.map.get_mut(&id) {
            Some(existing) => {
                existing.access_count = existing.access_count.max(update.access_count);
                if update.last_accessed_at >= existing.last_accessed_at {
                    existing.last_accessed_at = update.last_accessed_at;
                    existing.resonance = update.resonance;
                }
            }
            None => {
                state.map.insert(id.clone(), update);
            }
        }
        if is_new {
            state.order.push_back(id);
        }

        while state.map.len() > self.config.max_pending {
            if let Some(oldest) = state.order.pop_front() {
                if state.map.remove(&oldest).is_some() {
                    self.eviction_count.fetch_add(1, Ordering::Relaxed);
                    warn!(memory_id = %oldest, "evicted pending decay update: pending buffer full");
                }
            } else {
                break;
            }
        }
    }

    /// Atomically swap out the pending buffer, chunk it, and write every
    /// chunk to the provider. A failing chunk is logged and does not block
    /// subsequent chunks.
    pub async fn flush_now(&self) -> Result<(), BatchError> {
        let _flush_guard = self.flush_lock.lock().await;

        let updates: Vec<MemoryUpdate> = {
            let mut state = self.pending.lock().await;
            let map = std::mem::take(&mut state.map);
            state.order.clear();
            map.into_values().collect()
        };

        if updates.is_empty() {
            return Ok(());
        }

        if !self.provider.supports_batch_update() {
            warn!("storage provider does not support batch_update_memories; dropping flush");
            return Err(BatchError {
                failed: updates
                    .into_iter()
                    .map(|u| (u.memory_id, "provider does not support batch updates".to_string()))
                    .collect(),
            });
        }

        let mut failed = Vec::new();
        for chunk in updates.chunks(self.config.max_batch_size) {
            match self.provider.batch_update_memories(chunk).await {
                Ok(outcomes) => {
                    for BatchWriteOutcome { memory_id, result } in outcomes {
                        if let Err(reason) = result {
                            error!(memory_id = %memory_id, reason = %reason, "decay update failed to persist");
                            failed.push((memory_id, reason));
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, chunk_len = chunk.len(), "decay batch write failed");
                    for update in chunk {
                        failed.push((update.memory_id.clone(), err.to_string()));
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(BatchError { failed })
        }
    }

    /// Stop the timer, perform one last flush, and reject further `add`.
    pub async fn destroy(&self) -> Result<(), BatchError> {
        self.stopped.store(true, Ordering::Relaxed);
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
        self.flush_now().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryProvider;

    fn update(id: &str, resonance: f32, last_accessed_at: i64, access_count: u64) -> MemoryUpdate {
        MemoryUpdate {
            memory_id: id.to_string(),
            resonance,
            last_accessed_at,
            access_count,
        }
    }

    #[tokio::test]
    async fn newest_wins_merge_on_repeated_add() {
        let provider = Arc::new(InMemoryProvider::new());
        let processor = LazyDecayBatchProcessor::new(provider.clone());

        processor.add(update("m1", 0.9, 100, 1)).await;
        processor.add(update("m1", 0.5, 200, 5)).await;
        processor.add(update("m1", 0.7, 150, 3)).await;

        assert_eq!(processor.pending_len().await, 1);
        processor.flush_now().await.unwrap();

        let persisted = provider.get_update("m1").await.unwrap();
        assert_eq!(persisted.resonance, 0.5);
        assert_eq!(persisted.last_accessed_at, 200);
        assert_eq!(persisted.access_count, 5);
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_and_counts_once() {
        let provider = Arc::new(InMemoryProvider::new());
        let config = LazyDecayBatchProcessorConfig {
            max_pending: 10_000,
            ..Default::default()
        };
        let processor = LazyDecayBatchProcessor::with_config(provider, config);

        for i in 0..10_001 {
            processor.add(update(&format!("m{i}"), 1.0, i as i64, 1)).await;
        }

        assert_eq!(processor.pending_len().await, 10_000);
        assert_eq!(processor.eviction_count(), 1);
    }

    #[tokio::test]
    async fn flush_is_empty_noop() {
        let provider = Arc::new(InMemoryProvider::new());
        let processor = LazyDecayBatchProcessor::new(provider);
        assert!(processor.flush_now().await.is_ok());
    }

    #[tokio::test]
    async fn destroy_flushes_and_rejects_further_adds() {
        let provider = Arc::new(InMemoryProvider::new());
        let processor = LazyDecayBatchProcessor::new(provider.clone());
        processor.add(update("m1", 0.8, 10, 1)).await;
        processor.destroy().await.unwrap();

        assert!(provider.get_update("m1").await.is_some());

        processor.add(update("m2", 0.8, 10, 1)).await;
        assert_eq!(processor.pending_len().await, 0);
    }
}
