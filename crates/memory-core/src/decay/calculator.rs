//! Pure decay math
//!
//! No I/O, no shared state — a thin struct wrapping a config around a
//! simple exponential resonance-decay model.

use crate::model::{Memory, MemoryStatus};

#[derive(Debug, Clone)]
pub struct LazyDecayCalculatorConfig {
    /// Minimum time since last access before resonance is recomputed at all
    /// (ms). Prevents redundant recompute on rapid repeated recalls.
    pub min_update_interval_ms: i64,
    /// Window after the last access during which a fresh access reinforces
    /// rather than decays (ms).
    pub reinforce_window_ms: i64,
    /// Minimum |new - old| resonance delta that marks an update as
    /// significant enough to flush.
    pub significance_threshold: f32,
}

impl Default for LazyDecayCalculatorConfig {
    fn default() -> Self {
        LazyDecayCalculatorConfig {
            min_update_interval_ms: 60_000,
            reinforce_window_ms: 24 * 60 * 60 * 1000,
            significance_threshold: 0.10,
        }
    }
}

/// Result of computing decay for one memory at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayOutcome {
    pub new_resonance: f32,
    pub should_update: bool,
    pub reinforced: bool,
}

/// Diminishing-returns reinforcement gain: frequently accessed memories gain
/// less per access than rarely accessed ones, so resonance doesn't simply
/// latch at 1.0 after a handful of recalls.
fn reinforcement_gain(access_count: u64) -> f32 {
    const BASE_GAIN: f32 = 0.15;
    const DECAY_PER_ACCESS: f32 = 0.1;
    BASE_GAIN / (1.0 + access_count as f32 * DECAY_PER_ACCESS)
}

#[derive(Debug, Clone, Default)]
pub struct LazyDecayCalculator {
    config: LazyDecayCalculatorConfig,
}

impl LazyDecayCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LazyDecayCalculatorConfig) -> Self {
        LazyDecayCalculator { config }
    }

    pub fn config(&self) -> &LazyDecayCalculatorConfig {
        &self.config
    }

    /// Compute the current resonance for `memory` as of `now` (ms since
    /// epoch) following the five-step decay algorithm.
    pub fn calculate(&self, memory: &Memory, now: i64) -> DecayOutcome {
        if matches!(memory.status, MemoryStatus::Archived) {
            return DecayOutcome {
                new_resonance: memory.resonance,
                should_update: false,
                reinforced: false,
            };
        }

        let delta_access = now.saturating_sub(memory.last_accessed_at);
        if delta_access < self.config.min_update_interval_ms {
            return DecayOutcome {
                new_resonance: memory.resonance,
                should_update: false,
                reinforced: false,
            };
        }

        if memory.reinforceable && delta_access <= self.config.reinforce_window_ms {
            let gain = reinforcement_gain(memory.access_count);
            let new_resonance = (memory.resonance + gain).min(1.0);
            return DecayOutcome {
                new_resonance,
                should_update: true,
                reinforced: true,
            };
        }

        if memory.never_decay {
            return DecayOutcome {
                new_resonance: memory.resonance,
                should_update: false,
                reinforced: false,
            };
        }

        let half_life_days = memory.half_life_days().max(f64::EPSILON);
        let delta_created_days =
            now.saturating_sub(memory.created_at).max(0) as f64 / (24.0 * 60.0 * 60.0 * 1000.0);
        let decay_factor = 0.5_f64.powf(delta_created_days / half_life_days);
        let new_resonance = ((memory.resonance as f64) * decay_factor).clamp(0.0, 1.0) as f32;

        let should_update =
            (new_resonance - memory.resonance).abs() >= self.config.significance_threshold;

        DecayOutcome {
            new_resonance,
            should_update,
            reinforced: false,
        }
    }

    /// Batch variant: returns a vector aligned with `memories`.
    pub fn calculate_batch(&self, memories: &[Memory], now: i64) -> Vec<DecayOutcome> {
        memories.iter().map(|m| self.calculate(m, now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryType, NewMemory};

    fn memory_with(
        memory_type: MemoryType,
        resonance: f32,
        created_at: i64,
        last_accessed_at: i64,
        never_decay: bool,
        reinforceable: bool,
        custom_half_life_days: Option<f64>,
    ) -> Memory {
        let mut memory = Memory::new("u", "a", memory_type, NewMemory::default()).unwrap();
        memory.resonance = resonance;
        memory.created_at = created_at;
        memory.last_accessed_at = last_accessed_at;
        memory.updated_at = created_at;
        memory.never_decay = never_decay;
        memory.reinforceable = reinforceable;
        memory.custom_half_life_days = custom_half_life_days;
        memory
    }

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    #[test]
    fn s1_basic_half_life_decay() {
        let calc = LazyDecayCalculator::new();
        let now = 30 * DAY_MS + DAY_MS; // well past the reinforce window
        let memory = memory_with(MemoryType::Semantic, 1.0, 0, 0, false, false, None);
        let outcome = calc.calculate(&memory, now);
        assert!((outcome.new_resonance - 0.5).abs() < 0.01, "{}", outcome.new_resonance);
        assert!(outcome.should_update);
    }

    #[test]
    fn s2_never_decay_holds_resonance() {
        let calc = LazyDecayCalculator::new();
        let now = 365 * DAY_MS + DAY_MS;
        let memory = memory_with(MemoryType::Semantic, 1.0, 0, 0, true, false, None);
        let outcome = calc.calculate(&memory, now);
        assert_eq!(outcome.new_resonance, 1.0);
        assert!(!outcome.should_update);
    }

    #[test]
    fn s3_custom_half_life() {
        let calc = LazyDecayCalculator::new();
        let now = 15 * DAY_MS + DAY_MS;
        let memory = memory_with(MemoryType::Semantic, 1.0, 0, 0, false, false, Some(15.0));
        let outcome = calc.calculate(&memory, now);
        assert!((outcome.new_resonance - 0.5).abs() < 0.01, "{}", outcome.new_resonance);
    }

    #[test]
    fn archived_memories_never_update() {
        let calc = LazyDecayCalculator::new();
        let mut memory = memory_with(MemoryType::Semantic, 1.0, 0, 0, false, false, None);
        memory.status = MemoryStatus::Archived;
        let outcome = calc.calculate(&memory, 100 * DAY_MS);
        assert_eq!(outcome.new_resonance, 1.0);
        assert!(!outcome.should_update);
        assert!(!outcome.reinforced);
    }

    #[test]
    fn boundary_min_update_interval_blocks_update() {
        let calc = LazyDecayCalculator::new();
        let memory = memory_with(MemoryType::Semantic, 1.0, 0, 0, false, false, None);
        let outcome = calc.calculate(&memory, calc.config().min_update_interval_ms);
        assert!(!outcome.should_update);
    }

    #[test]
    fn reinforcement_within_window_boosts_resonance() {
        let calc = LazyDecayCalculator::new();
        let mut memory = memory_with(MemoryType::Episodic, 0.5, 0, 0, false, true, None);
        memory.access_count = 0;
        let now = calc.config().min_update_interval_ms + 1;
        let outcome = calc.calculate(&memory, now);
        assert!(outcome.reinforced);
        assert!(outcome.new_resonance > 0.5);
        assert!(outcome.should_update);
    }

    #[test]
    fn reinforcement_never_exceeds_one() {
        let calc = LazyDecayCalculator::new();
        let memory = memory_with(MemoryType::Episodic, 0.95, 0, 0, false, true, None);
        let now = calc.config().min_update_interval_ms + 1;
        let outcome = calc.calculate(&memory, now);
        assert!(outcome.new_resonance <= 1.0);
    }

    #[test]
    fn monotonic_decay_without_access_in_between() {
        let calc = LazyDecayCalculator::new();
        let memory = memory_with(MemoryType::Semantic, 1.0, 0, 0, false, false, None);
        let r1 = calc.calculate(&memory, 40 * DAY_MS).new_resonance;
        let r2 = calc.calculate(&memory, 80 * DAY_MS).new_resonance;
        assert!(r2 <= r1);
        assert!((0.0..=1.0).contains(&r1));
        assert!((0.0..=1.0).contains(&r2));
    }
}
