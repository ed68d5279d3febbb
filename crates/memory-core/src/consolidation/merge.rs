//! Similarity-merge of near-duplicate semantic memories.

use crate::embedder::cosine_similarity;
use crate::model::{metadata_keys, Memory};

#[derive(Debug, Clone, Copy)]
pub struct MergeConfig {
    pub similarity_threshold: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            similarity_threshold: 0.85,
        }
    }
}

/// Pairs up near-duplicate memories (by embedding) so they can be folded
/// into one. Operates on `(Memory, embedding)` pairs rather than calling an
/// `Embedder` itself — the caller already has embeddings from vector
/// storage or a prior recall, and merging shouldn't force a re-embed.
pub struct MergePlanner {
    config: MergeConfig,
}

impl MergePlanner {
    pub fn new(config: MergeConfig) -> Self {
        MergePlanner { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Greedily groups `candidates` into clusters where every member is
    /// within `similarity_threshold` of the cluster's first (anchor)
    /// member. Not a full transitive-closure clustering — good enough for
    /// deduplicating near-identical facts, and avoids O(n^2) union-find
    /// bookkeeping for what is expected to be a small candidate set per run.
    pub fn plan_merges<'a>(&self, candidates: &'a [(Memory, Vec<f32>)]) -> Vec<Vec<&'a Memory>> {
        let mut clusters: Vec<(Vec<f32>, Vec<&Memory>)> = Vec::new();

        'candidate: for (memory, embedding) in candidates {
            for (anchor_embedding, members) in &mut clusters {
                if cosine_similarity(anchor_embedding, embedding) >= self.config.similarity_threshold {
                    members.push(memory);
                    continue 'candidate;
                }
            }
            clusters.push((embedding.clone(), vec![memory]));
        }

        clusters
            .into_iter()
            .map(|(_, members)| members)
            .filter(|members| members.len() > 1)
            .collect()
    }

    /// Fold a cluster into one surviving memory: the highest-importance
    /// member's content wins, its resonance is boosted to the cluster max,
    /// `created_at`/`last_accessed_at` span the full cluster's lifetime,
    /// keywords are unioned (capped at 20), and `metadata_keys::MERGED_FROM`
    /// records the absorbed ids.
    pub fn merge_cluster(&self, cluster: &[&Memory]) -> Option<Memory> {
        let anchor = cluster
            .iter()
            .max_by(|a, b| a.importance.partial_cmp(&b.importance).unwrap())?;
        let mut merged = (*anchor).clone();
        merged.resonance = cluster.iter().map(|m| m.resonance).fold(0.0f32, f32::max);
        merged.access_count = cluster.iter().map(|m| m.access_count).sum();
        merged.created_at = cluster.iter().map(|m| m.created_at).min().unwrap_or(merged.created_at);
        merged.last_accessed_at = cluster.iter().map(|m| m.last_accessed_at).max().unwrap_or(merged.last_accessed_at);

        let mut keywords: Vec<String> = Vec::new();
        for member in cluster {
            if let Some(member_keywords) = &member.keywords {
                for keyword in member_keywords {
                    if !keywords.contains(keyword) {
                        keywords.push(keyword.clone());
                    }
                }
            }
        }
        keywords.truncate(20);
        merged.keywords = (!keywords.is_empty()).then_some(keywords);

        let absorbed: Vec<serde_json::Value> = cluster
            .iter()
            .filter(|m| m.id != merged.id)
            .map(|m| serde_json::Value::String(m.id.clone()))
            .collect();
        merged
            .metadata
            .insert(metadata_keys::MERGED_FROM.to_string(), serde_json::Value::Array(absorbed));
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryType, NewMemory};

    fn memory(importance: f32) -> Memory {
        Memory::new("u", "a", MemoryType::Semantic, NewMemory { importance, ..Default::default() }).unwrap()
    }

    #[test]
    fn clusters_near_duplicates() {
        let planner = MergePlanner::new(MergeConfig::default());
        let candidates = vec![
            (memory(0.5), vec![1.0, 0.0]),
            (memory(0.9), vec![0.99, 0.01]),
            (memory(0.3), vec![0.0, 1.0]),
        ];
        let clusters = planner.plan_merges(&candidates);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }

    #[test]
    fn merge_keeps_highest_importance_content_and_sums_access() {
        let planner = MergePlanner::new(MergeConfig::default());
        let mut a = memory(0.9);
        a.access_count = 2;
        let mut b = memory(0.4);
        b.access_count = 3;
        let merged = planner.merge_cluster(&[&a, &b]).unwrap();
        assert_eq!(merged.id, a.id);
        assert_eq!(merged.access_count, 5);
    }

    #[test]
    fn merge_spans_created_and_last_accessed_across_the_cluster() {
        let planner = MergePlanner::new(MergeConfig::default());
        let mut a = memory(0.9);
        a.created_at = 2_000;
        a.last_accessed_at = 2_000;
        let mut b = memory(0.4);
        b.created_at = 1_000;
        b.last_accessed_at = 3_000;
        let merged = planner.merge_cluster(&[&a, &b]).unwrap();
        assert_eq!(merged.created_at, 1_000);
        assert_eq!(merged.last_accessed_at, 3_000);
    }

    #[test]
    fn merge_unions_and_caps_keywords() {
        let planner = MergePlanner::new(MergeConfig::default());
        let mut a = memory(0.9);
        a.keywords = Some(vec!["rust".to_string(), "async".to_string()]);
        let mut b = memory(0.4);
        b.keywords = Some((0..25).map(|i| format!("kw{i}")).collect());
        let merged = planner.merge_cluster(&[&a, &b]).unwrap();
        let keywords = merged.keywords.unwrap();
        assert!(keywords.contains(&"rust".to_string()));
        assert!(keywords.len() <= 20);
    }
}
