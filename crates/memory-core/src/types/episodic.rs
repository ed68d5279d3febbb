//! Episodic memory policy: specific events, admitted above an importance
//! floor and capped per session.

use crate::config::EpisodicMemoryConfig;
use crate::error::Result;
use crate::model::{Memory, NewMemory};

#[derive(Debug, Clone)]
pub struct EpisodicPolicy {
    config: EpisodicMemoryConfig,
}

impl EpisodicPolicy {
    pub fn new(config: EpisodicMemoryConfig) -> Self {
        EpisodicPolicy { config }
    }

    pub fn config(&self) -> &EpisodicMemoryConfig {
        &self.config
    }

    pub fn validate_new(&self, _input: &NewMemory) -> Result<()> {
        Ok(())
    }

    /// Below `importance_threshold`, an episodic memory is recorded as an
    /// event but not admitted to durable storage.
    pub fn should_admit(&self, memory: &Memory) -> bool {
        memory.importance >= self.config.importance_threshold
    }

    /// True once a session has reached its episodic memory cap; callers
    /// should evict or consolidate the oldest before admitting more.
    pub fn at_session_capacity(&self, current_count: usize) -> bool {
        current_count >= self.config.max_memories_per_session
    }
}
