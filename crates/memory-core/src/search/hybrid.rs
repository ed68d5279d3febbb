//! Hybrid recall: gathers candidates from the storage provider (and its
//! vector search, when available) and fuses them under a `RecallWeights`
//! preset.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RecallWeights;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::provider::{HybridSearchParams, RecallFilter, ScoredCandidate, StorageProvider};
use crate::search::fusion::{self, DimensionScores, FusedResult};
use crate::temporal::recency_score;

pub struct HybridSearch {
    provider: Arc<dyn StorageProvider>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl HybridSearch {
    pub fn new(provider: Arc<dyn StorageProvider>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        HybridSearch { provider, embedder }
    }

    /// Run a hybrid search and return results fused and ranked under
    /// `weights`. When the provider advertises a native hybrid search, its
    /// result is used directly; otherwise candidates are gathered from the
    /// provider's text recall always, and additionally from vector search
    /// when the provider supports it and an embedder is configured. Either
    /// way, a memory found by any path still gets a score on every
    /// dimension (0 where that path didn't surface it).
    pub async fn search(
        &self,
        user_id: &str,
        agent_id: &str,
        query_text: &str,
        weights: &RecallWeights,
        filter: &RecallFilter,
        now: i64,
    ) -> Result<Vec<FusedResult>> {
        weights.validate()?;

        let by_id = if self.provider.supports_hybrid_search() {
            self.gather_native(user_id, agent_id, query_text, weights, filter).await?
        } else {
            self.gather_fallback(user_id, agent_id, query_text, filter).await?
        };

        let mut results = Vec::with_capacity(by_id.len());
        for (memory, vector_score) in by_id.into_values() {
            let half_life = memory.half_life_days();
            let scores = DimensionScores {
                vector: vector_score.unwrap_or(0.0),
                text: fusion::text_score(query_text, &memory.content),
                temporal: recency_score(memory.last_accessed_at, now, half_life),
                procedural: fusion::procedural_score(&memory, query_text, now),
            };
            let fused_score = scores.fuse(weights);
            results.push(FusedResult { memory, scores, fused_score });
        }

        let mut ranked = fusion::rank(results);
        if filter.limit > 0 {
            ranked.truncate(filter.limit);
        }
        Ok(ranked)
    }

    /// Query the provider's own hybrid search rather than gathering text and
    /// vector candidates separately — the provider is assumed to fuse its
    /// native indices more efficiently than two round trips plus a merge.
    async fn gather_native(
        &self,
        user_id: &str,
        agent_id: &str,
        query_text: &str,
        weights: &RecallWeights,
        filter: &RecallFilter,
    ) -> Result<HashMap<String, (crate::model::Memory, Option<f32>)>> {
        let query_vector = match &self.embedder {
            Some(embedder) => Some(embedder.embed(query_text).await?.vector),
            None => None,
        };
        let params = HybridSearchParams {
            text_weight: weights.text,
            vector_weight: weights.vector,
            threshold: 0.0,
            filter: filter.clone(),
        };
        let candidates: Vec<ScoredCandidate> = self
            .provider
            .hybrid_search(user_id, agent_id, query_text, query_vector.as_deref(), &params)
            .await?;

        let mut by_id = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            by_id.insert(candidate.memory.id.clone(), (candidate.memory, candidate.vector_score));
        }
        Ok(by_id)
    }

    async fn gather_fallback(
        &self,
        user_id: &str,
        agent_id: &str,
        query_text: &str,
        filter: &RecallFilter,
    ) -> Result<HashMap<String, (crate::model::Memory, Option<f32>)>> {
        let text_candidates = self.provider.recall(user_id, agent_id, query_text, filter).await?;
        let mut by_id = HashMap::new();
        for memory in text_candidates {
            by_id.entry(memory.id.clone()).or_insert_with(|| (memory, None::<f32>));
        }

        if self.provider.supports_vector_ops() {
            if let Some(embedder) = &self.embedder {
                let embedding = embedder.embed(query_text).await?;
                let vector_candidates = self
                    .provider
                    .search_by_vector(user_id, agent_id, &embedding.vector, filter)
                    .await?;
                for candidate in vector_candidates {
                    let entry = by_id
                        .entry(candidate.memory.id.clone())
                        .or_insert_with(|| (candidate.memory.clone(), None));
                    entry.1 = candidate.vector_score;
                }
            }
        }

        Ok(by_id)
    }
}
