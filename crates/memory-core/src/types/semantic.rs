//! Semantic memory policy: generalized facts, admitted above a confidence
//! floor and deduplicated against near-identical existing facts.

use crate::config::SemanticMemoryConfig;
use crate::embedder::cosine_similarity;
use crate::error::Result;
use crate::model::{Memory, NewMemory};

#[derive(Debug, Clone)]
pub struct SemanticPolicy {
    config: SemanticMemoryConfig,
}

impl SemanticPolicy {
    pub fn new(config: SemanticMemoryConfig) -> Self {
        SemanticPolicy { config }
    }

    pub fn config(&self) -> &SemanticMemoryConfig {
        &self.config
    }

    pub fn validate_new(&self, _input: &NewMemory) -> Result<()> {
        Ok(())
    }

    pub fn should_admit(&self, memory: &Memory) -> bool {
        memory.importance >= self.config.confidence_threshold
    }

    /// True when `candidate_embedding` is close enough to an existing
    /// semantic memory's embedding that the candidate should be merged
    /// rather than stored as a new fact (consolidation's merge pass).
    pub fn is_duplicate_of(&self, candidate_embedding: &[f32], existing_embedding: &[f32]) -> bool {
        cosine_similarity(candidate_embedding, existing_embedding) >= self.config.deduplication_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_identical_vectors_are_duplicates() {
        let policy = SemanticPolicy::new(SemanticMemoryConfig {
            deduplication_threshold: 0.9,
            ..Default::default()
        });
        assert!(policy.is_duplicate_of(&[1.0, 0.0], &[1.0, 0.01]));
        assert!(!policy.is_duplicate_of(&[1.0, 0.0], &[0.0, 1.0]));
    }
}
