//! Four-dimensional score fusion
//!
//! Every candidate gets a vector, text, temporal, and procedural score in
//! `[0, 1]`; the final rank is the weighted sum under a `RecallWeights`
//! preset. Keeping fusion as a pure function (no provider/embedder calls)
//! makes the weighting itself trivially testable, independent of whatever
//! orchestration gathers the candidates.

use std::collections::HashSet;

use crate::config::RecallWeights;
use crate::model::Memory;
use crate::temporal::recency_score;

#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionScores {
    pub vector: f32,
    pub text: f32,
    pub temporal: f32,
    pub procedural: f32,
}

impl DimensionScores {
    pub fn fuse(&self, weights: &RecallWeights) -> f32 {
        self.vector * weights.vector
            + self.text * weights.text
            + self.temporal * weights.temporal
            + self.procedural * weights.procedural
    }
}

/// Word-overlap (Jaccard) text relevance score in `[0, 1]`. Words shorter
/// than 4 characters are dropped as low-signal stopwords.
pub fn text_score(query: &str, content: &str) -> f32 {
    let query_words = significant_words(query);
    let content_words = significant_words(content);
    if query_words.is_empty() || content_words.is_empty() {
        return 0.0;
    }
    let intersection = query_words.intersection(&content_words).count();
    let union = query_words.union(&content_words).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .collect()
}

/// Heuristic procedural relevance: boosts a procedural memory whose content
/// (its trigger/pattern) matches `query`, weighted by both its own
/// importance (a stand-in for a tracked success rate, since a per-memory
/// attempt/success counter isn't part of the stored `Memory` shape) and how
/// recently it was last used. Every other memory type contributes 0 to this
/// dimension.
pub fn procedural_score(memory: &Memory, query: &str, now: i64) -> f32 {
    if memory.memory_type != crate::model::MemoryType::Procedural {
        return 0.0;
    }
    let trigger_match = text_score(query, &memory.content);
    let recency = recency_score(memory.last_accessed_at, now, memory.half_life_days());
    (memory.importance * 0.4 + trigger_match * 0.4 + recency * 0.2).clamp(0.0, 1.0)
}

/// A fully-scored recall result, ordered by descending fused score, then by
/// descending importance, then by descending recency, then by `memory.id`
/// so identical scores don't produce run-to-run-unstable ordering.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub memory: Memory,
    pub scores: DimensionScores,
    pub fused_score: f32,
}

pub fn rank(mut results: Vec<FusedResult>) -> Vec<FusedResult> {
    results.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.memory
                    .importance
                    .partial_cmp(&a.memory.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b.memory.last_accessed_at.cmp(&a.memory.last_accessed_at))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryType, NewMemory};

    #[test]
    fn identical_text_scores_one() {
        assert!((text_score("the quick brown fox", "the quick brown fox") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_text_scores_zero() {
        assert_eq!(text_score("rust ownership model", "python garbage collector"), 0.0);
    }

    #[test]
    fn fuse_respects_weights() {
        let weights = RecallWeights {
            vector: 1.0,
            text: 0.0,
            temporal: 0.0,
            procedural: 0.0,
        };
        let scores = DimensionScores {
            vector: 0.8,
            text: 1.0,
            temporal: 1.0,
            procedural: 1.0,
        };
        assert!((scores.fuse(&weights) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn ranking_breaks_ties_by_importance_then_recency_then_id() {
        let mut a = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        a.id = "b".to_string();
        let mut b = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        b.id = "a".to_string();
        let results = vec![
            FusedResult { memory: a, scores: DimensionScores::default(), fused_score: 0.5 },
            FusedResult { memory: b, scores: DimensionScores::default(), fused_score: 0.5 },
        ];
        let ranked = rank(results);
        assert_eq!(ranked[0].memory.id, "a");
    }

    #[test]
    fn ranking_prefers_higher_importance_before_falling_back_to_id() {
        let mut a = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        a.id = "a".to_string();
        a.importance = 0.2;
        let mut b = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        b.id = "z".to_string();
        b.importance = 0.8;
        let results = vec![
            FusedResult { memory: a, scores: DimensionScores::default(), fused_score: 0.5 },
            FusedResult { memory: b, scores: DimensionScores::default(), fused_score: 0.5 },
        ];
        let ranked = rank(results);
        assert_eq!(ranked[0].memory.id, "z");
    }

    #[test]
    fn procedural_score_is_zero_off_type() {
        let memory = Memory::new("u", "a", MemoryType::Semantic, NewMemory { importance: 0.9, ..Default::default() }).unwrap();
        assert_eq!(procedural_score(&memory, "some query", crate::model::now_ms()), 0.0);
    }

    #[test]
    fn procedural_score_boosts_a_matching_trigger() {
        let matching = Memory::new(
            "u",
            "a",
            MemoryType::Procedural,
            NewMemory { content: "how to deploy the service safely".to_string(), importance: 0.5, ..Default::default() },
        )
        .unwrap();
        let unrelated = Memory::new(
            "u",
            "a",
            MemoryType::Procedural,
            NewMemory { content: "completely different topic entirely".to_string(), importance: 0.5, ..Default::default() },
        )
        .unwrap();
        let now = crate::model::now_ms();
        let matching_score = procedural_score(&matching, "how to deploy the service", now);
        let unrelated_score = procedural_score(&unrelated, "how to deploy the service", now);
        assert!(matching_score > unrelated_score);
    }
}
