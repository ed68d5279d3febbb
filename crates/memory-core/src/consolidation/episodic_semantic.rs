//! Episodic → semantic promotion.
//!
//! A cluster of related episodic memories that keeps getting accessed is
//! evidence of a generalizable fact, not just a one-off event. Promotion
//! doesn't delete the episodes — the new semantic memory's metadata records
//! which episodic ids it was generalized from (`metadata_keys::MERGED_FROM`)
//! so provenance survives.

use crate::model::{metadata_keys, Memory, MemoryType, NewMemory};

/// Config for when an episodic cluster is worth promoting.
#[derive(Debug, Clone)]
pub struct PromotionConfig {
    /// Minimum access_count across the cluster's memories, summed, before
    /// promotion is considered.
    pub min_total_access_count: u64,
    /// Minimum mean importance across the cluster.
    pub min_mean_importance: f32,
    /// Minimum age, in milliseconds since `created_at`, every member of the
    /// cluster must have reached before promotion is considered. A cluster
    /// that is still actively accumulating episodes isn't generalized yet.
    pub max_age_ms: i64,
    /// Whether a promoted episodic memory is kept active (`true`) once its
    /// content is folded into the new semantic memory, or archived
    /// (`false`) so recall surfaces the generalization instead of the raw
    /// episodes it was built from.
    pub preserve_originals: bool,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        PromotionConfig {
            min_total_access_count: 3,
            min_mean_importance: 0.5,
            max_age_ms: 7 * 24 * 3600 * 1000,
            preserve_originals: false,
        }
    }
}

pub struct EpisodicPromoter {
    config: PromotionConfig,
}

impl EpisodicPromoter {
    pub fn new(config: PromotionConfig) -> Self {
        EpisodicPromoter { config }
    }

    pub fn config(&self) -> &PromotionConfig {
        &self.config
    }

    /// Whether `cluster` (a set of episodic memories already judged related
    /// by connection discovery or shared session) should be promoted to a
    /// single semantic memory. Every member must be at least `max_age_ms`
    /// old — a cluster still accumulating fresh episodes isn't settled
    /// enough to generalize yet.
    pub fn should_promote(&self, cluster: &[Memory], now: i64) -> bool {
        if cluster.is_empty() {
            return false;
        }
        let total_access: u64 = cluster.iter().map(|m| m.access_count).sum();
        let mean_importance: f32 =
            cluster.iter().map(|m| m.importance).sum::<f32>() / cluster.len() as f32;
        let all_old_enough = cluster
            .iter()
            .all(|m| now.saturating_sub(m.created_at) >= self.config.max_age_ms);
        total_access >= self.config.min_total_access_count
            && mean_importance >= self.config.min_mean_importance
            && all_old_enough
    }

    /// Whether originals should be archived once `cluster` is promoted.
    pub fn should_archive_originals(&self) -> bool {
        !self.config.preserve_originals
    }

    /// Build the `NewMemory` for the promoted semantic fact. `summary`
    /// is the generalized statement distilled from the cluster (produced
    /// upstream, e.g. by PRIME or a caller-supplied heuristic); this module
    /// only owns the promotion policy, not summarization.
    pub fn build_semantic_memory(&self, cluster: &[Memory], summary: impl Into<String>) -> NewMemory {
        let mean_importance = if cluster.is_empty() {
            0.0
        } else {
            cluster.iter().map(|m| m.importance).sum::<f32>() / cluster.len() as f32
        };
        let mut metadata = std::collections::HashMap::new();
        let merged_from: Vec<serde_json::Value> = cluster
            .iter()
            .map(|m| serde_json::Value::String(m.id.clone()))
            .collect();
        metadata.insert(
            metadata_keys::MERGED_FROM.to_string(),
            serde_json::Value::Array(merged_from),
        );

        NewMemory {
            content: summary.into(),
            importance: mean_importance.clamp(0.0, 1.0),
            metadata,
            ..Default::default()
        }
    }

    pub const TARGET_TYPE: MemoryType = MemoryType::Semantic;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryType as MT, NewMemory as NM};

    fn episodic(access_count: u64, importance: f32) -> Memory {
        let mut m = Memory::new("u", "a", MT::Episodic, NM { importance, ..Default::default() }).unwrap();
        m.access_count = access_count;
        m.created_at -= PromotionConfig::default().max_age_ms + 1;
        m
    }

    #[test]
    fn promotes_when_accessed_important_and_old_enough() {
        let promoter = EpisodicPromoter::new(PromotionConfig::default());
        let cluster = vec![episodic(2, 0.6), episodic(2, 0.5)];
        assert!(promoter.should_promote(&cluster, crate::model::now_ms()));
    }

    #[test]
    fn does_not_promote_rarely_accessed() {
        let promoter = EpisodicPromoter::new(PromotionConfig::default());
        let cluster = vec![episodic(0, 0.9)];
        assert!(!promoter.should_promote(&cluster, crate::model::now_ms()));
    }

    #[test]
    fn does_not_promote_a_cluster_still_accumulating_fresh_episodes() {
        let promoter = EpisodicPromoter::new(PromotionConfig::default());
        let mut fresh = Memory::new("u", "a", MT::Episodic, NM { importance: 0.9, ..Default::default() }).unwrap();
        fresh.access_count = 5;
        assert!(!promoter.should_promote(&[fresh], crate::model::now_ms()));
    }

    #[test]
    fn build_records_provenance() {
        let promoter = EpisodicPromoter::new(PromotionConfig::default());
        let cluster = vec![episodic(2, 0.6)];
        let new_memory = promoter.build_semantic_memory(&cluster, "generalized fact");
        assert!(new_memory.metadata.contains_key(metadata_keys::MERGED_FROM));
    }
}
