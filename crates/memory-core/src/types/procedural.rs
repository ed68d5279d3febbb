//! Procedural memory policy: how-to knowledge, gated on a tracked success
//! rate rather than a one-shot importance score.

use crate::config::ProceduralMemoryConfig;
use crate::error::Result;
use crate::model::{Memory, NewMemory};

#[derive(Debug, Clone)]
pub struct ProceduralPolicy {
    config: ProceduralMemoryConfig,
}

impl ProceduralPolicy {
    pub fn new(config: ProceduralMemoryConfig) -> Self {
        ProceduralPolicy { config }
    }

    pub fn config(&self) -> &ProceduralMemoryConfig {
        &self.config
    }

    pub fn validate_new(&self, _input: &NewMemory) -> Result<()> {
        Ok(())
    }

    pub fn should_admit(&self, memory: &Memory) -> bool {
        memory.importance >= self.config.confidence_threshold
    }

    /// A procedural pattern's observed success rate (successes / attempts),
    /// used to decide whether it should keep being recommended.
    pub fn success_rate(&self, successes: u32, attempts: u32) -> f32 {
        if attempts == 0 {
            return 0.0;
        }
        successes as f32 / attempts as f32
    }

    pub fn meets_min_success_rate(&self, successes: u32, attempts: u32) -> bool {
        self.success_rate(successes, attempts) >= self.config.min_success_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_below_threshold_fails() {
        let policy = ProceduralPolicy::new(ProceduralMemoryConfig {
            min_success_rate: 0.6,
            ..Default::default()
        });
        assert!(!policy.meets_min_success_rate(1, 3));
        assert!(policy.meets_min_success_rate(2, 3));
    }

    #[test]
    fn zero_attempts_is_zero_rate() {
        let policy = ProceduralPolicy::new(ProceduralMemoryConfig::default());
        assert_eq!(policy.success_rate(0, 0), 0.0);
    }
}
