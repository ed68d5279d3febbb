//! Temporal pattern analysis
//!
//! Two things live here: a pure `recency_score` used as the temporal
//! dimension of hybrid recall fusion, and `TemporalAnalyzer`, which
//! looks for patterns (active hours, periodicity) across a memory set. The
//! analyzer is cancellable mid-scan — a long-running background job over a
//! large memory set should stop promptly if the caller drops interest,
//! rather than running to completion on work nobody wants anymore.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::model::Memory;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Exponential recency score in `[0, 1]`: 1.0 at `now`, 0.5 after
/// `half_life_days`. Shared by the fusion weighting in search::fusion.
pub fn recency_score(last_accessed_at: i64, now: i64, half_life_days: f64) -> f32 {
    let half_life_days = half_life_days.max(f64::EPSILON);
    let age_days = now.saturating_sub(last_accessed_at).max(0) as f64 / DAY_MS as f64;
    0.5_f64.powf(age_days / half_life_days).clamp(0.0, 1.0) as f32
}

/// A cooperative cancellation flag. Cheap to clone and share across an
/// async task boundary; checked between chunks rather than per-item so
/// cancellation overhead stays negligible.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of temporal patterns found across a memory set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalInsights {
    /// Hour-of-day (0-23, UTC) buckets with at least one memory, sorted.
    pub active_hours: Vec<u8>,
    /// Mean gap between consecutive `created_at` timestamps, in hours, when
    /// at least two memories were analyzed.
    pub mean_interval_hours: Option<f64>,
    /// How many memories were scanned before completion or cancellation.
    pub memories_scanned: usize,
    pub cancelled: bool,
}

const SCAN_CHUNK: usize = 256;

/// Finds coarse temporal patterns across a memory set, in chunks, checking
/// `cancel` between chunks.
pub struct TemporalAnalyzer;

impl TemporalAnalyzer {
    pub fn new() -> Self {
        TemporalAnalyzer
    }

    pub async fn analyze(&self, memories: &[Memory], cancel: &CancellationToken) -> TemporalInsights {
        let mut hour_buckets = [false; 24];
        let mut timestamps = Vec::with_capacity(memories.len());
        let mut scanned = 0usize;

        for chunk in memories.chunks(SCAN_CHUNK) {
            if cancel.is_cancelled() {
                return TemporalInsights {
                    active_hours: collect_active_hours(&hour_buckets),
                    mean_interval_hours: mean_interval_hours(&timestamps),
                    memories_scanned: scanned,
                    cancelled: true,
                };
            }
            for memory in chunk {
                let hour = hour_of_day_utc(memory.created_at);
                hour_buckets[hour as usize] = true;
                timestamps.push(memory.created_at);
            }
            scanned += chunk.len();
            tokio::task::yield_now().await;
        }

        timestamps.sort_unstable();
        TemporalInsights {
            active_hours: collect_active_hours(&hour_buckets),
            mean_interval_hours: mean_interval_hours(&timestamps),
            memories_scanned: scanned,
            cancelled: false,
        }
    }
}

impl Default for TemporalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn hour_of_day_utc(epoch_ms: i64) -> u8 {
    let seconds = epoch_ms.div_euclid(1000);
    ((seconds.div_euclid(3600)).rem_euclid(24)) as u8
}

fn collect_active_hours(buckets: &[bool; 24]) -> Vec<u8> {
    buckets
        .iter()
        .enumerate()
        .filter_map(|(h, &present)| present.then_some(h as u8))
        .collect()
}

fn mean_interval_hours(sorted_timestamps: &[i64]) -> Option<f64> {
    if sorted_timestamps.len() < 2 {
        return None;
    }
    let mut sorted = sorted_timestamps.to_vec();
    sorted.sort_unstable();
    let total_ms: i64 = sorted.windows(2).map(|w| w[1] - w[0]).sum();
    let gaps = (sorted.len() - 1) as f64;
    Some((total_ms as f64 / gaps) / (3600.0 * 1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryType, NewMemory};

    fn memory_at(created_at: i64) -> Memory {
        let mut m = Memory::new("u", "a", MemoryType::Episodic, NewMemory::default()).unwrap();
        m.created_at = created_at;
        m
    }

    #[test]
    fn recency_score_halves_at_half_life() {
        let score = recency_score(0, 30 * DAY_MS, 30.0);
        assert!((score - 0.5).abs() < 0.01);
    }

    #[tokio::test]
    async fn analyzer_reports_active_hours_and_interval() {
        let analyzer = TemporalAnalyzer::new();
        let cancel = CancellationToken::new();
        let memories = vec![memory_at(0), memory_at(DAY_MS)];
        let insights = analyzer.analyze(&memories, &cancel).await;
        assert_eq!(insights.memories_scanned, 2);
        assert!(!insights.cancelled);
        assert_eq!(insights.mean_interval_hours, Some(24.0));
    }

    #[tokio::test]
    async fn cancellation_stops_early() {
        let analyzer = TemporalAnalyzer::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let memories = vec![memory_at(0); 10];
        let insights = analyzer.analyze(&memories, &cancel).await;
        assert!(insights.cancelled);
        assert_eq!(insights.memories_scanned, 0);
    }
}
