//! Smart-triage classification and creation of `MemoryConnection`s.

use tracing::{debug, warn};

use crate::chat::{ChatMessage, GenerateOptions};
use crate::config::{ConnectionDetectionConfig, ConnectionThresholds, CostControlConfig};
use crate::cost::CostTracker;
use crate::chat::Chat;
use crate::error::Result;
use crate::model::{ConnectionType, Memory, MemoryConnection};

const CONNECTIONS_COST_COMPONENT: &str = "connections";

/// Which tier of the similarity cascade a candidate pair falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityBand {
    /// High enough to connect as `Similar` without a model call.
    AutoSimilar,
    /// High enough to connect as `Related` without a model call.
    AutoRelated,
    /// Ambiguous: only worth connecting if an LLM classifies a relationship.
    NeedsLlm,
    /// Too low to be worth connecting at all.
    Ignore,
}

/// Discovers and creates connections between a source memory and a set of
/// embedding-similarity-scored candidates.
pub struct ConnectionManager {
    detection: ConnectionDetectionConfig,
    cost_control: CostControlConfig,
}

impl ConnectionManager {
    pub fn new(detection: ConnectionDetectionConfig, cost_control: CostControlConfig) -> Self {
        ConnectionManager {
            detection,
            cost_control,
        }
    }

    pub fn classify_band(&self, similarity: f32) -> SimilarityBand {
        self.classify_band_with(similarity, &self.detection.thresholds)
    }

    fn classify_band_with(&self, similarity: f32, thresholds: &ConnectionThresholds) -> SimilarityBand {
        if similarity >= thresholds.auto_similar {
            SimilarityBand::AutoSimilar
        } else if similarity >= thresholds.auto_related {
            SimilarityBand::AutoRelated
        } else if similarity >= thresholds.llm_required {
            SimilarityBand::NeedsLlm
        } else {
            SimilarityBand::Ignore
        }
    }

    /// Discover connections between `source` and `candidates` (each paired
    /// with a cosine similarity). `chat` is optional — without it, the
    /// `NeedsLlm` band is always dropped rather than guessed at. Each call
    /// is budgeted against `max_llm_calls_per_batch`; once exhausted, the
    /// remaining `NeedsLlm` candidates are dropped (a logged downgrade, not
    /// an error).
    pub async fn discover(
        &self,
        source: &Memory,
        candidates: &[(Memory, f32)],
        chat: Option<&dyn Chat>,
        cost_tracker: Option<&CostTracker>,
    ) -> Result<Vec<MemoryConnection>> {
        if !self.detection.enabled {
            return Ok(Vec::new());
        }

        let mut connections = Vec::new();
        let mut llm_calls_used = 0u32;
        let now = crate::model::now_ms();
        // When a tracker is supplied, the batch budget is enforced against
        // its lifetime call count rather than a local counter, so the
        // ceiling holds across concurrent batches sharing the same tracker.
        let batch_start_calls = cost_tracker.map(|t| t.spend_for(CONNECTIONS_COST_COMPONENT).calls).unwrap_or(0);

        for (candidate, similarity) in candidates.iter().take(self.detection.max_candidates) {
            if candidate.id == source.id {
                continue;
            }
            match self.classify_band(*similarity) {
                SimilarityBand::AutoSimilar => {
                    connections.push(self.build_connection(
                        source,
                        candidate,
                        ConnectionType::Similar,
                        *similarity,
                        now,
                        "embedding similarity above auto-similar threshold",
                    ));
                }
                SimilarityBand::AutoRelated => {
                    connections.push(self.build_connection(
                        source,
                        candidate,
                        ConnectionType::Related,
                        *similarity,
                        now,
                        "embedding similarity above auto-related threshold",
                    ));
                }
                SimilarityBand::NeedsLlm => {
                    let Some(chat) = chat else {
                        debug!(candidate = %candidate.id, "no chat capability available, dropping ambiguous candidate");
                        continue;
                    };
                    let budget_ok = match cost_tracker {
                        Some(tracker) => tracker
                            .check_budget(CONNECTIONS_COST_COMPONENT, batch_start_calls + self.cost_control.max_llm_calls_per_batch as u64)
                            .is_ok(),
                        None => llm_calls_used < self.cost_control.max_llm_calls_per_batch,
                    };
                    if !budget_ok {
                        warn!(
                            candidate = %candidate.id,
                            "llm call budget for this batch exhausted, dropping ambiguous candidate"
                        );
                        continue;
                    }
                    if self.cost_control.prefer_embedding_when_similar && *similarity >= self.detection.thresholds.auto_related - 0.05 {
                        connections.push(self.build_connection(
                            source,
                            candidate,
                            ConnectionType::Related,
                            *similarity,
                            now,
                            "near auto-related threshold, preferring embedding signal over an llm call",
                        ));
                        continue;
                    }
                    llm_calls_used += 1;
                    if let Some(conn) =
                        self.classify_with_llm(source, candidate, *similarity, now, chat, cost_tracker).await?
                    {
                        connections.push(conn);
                    }
                }
                SimilarityBand::Ignore => {}
            }
        }

        Ok(connections)
    }

    fn build_connection(
        &self,
        source: &Memory,
        target: &Memory,
        connection_type: ConnectionType,
        strength: f32,
        created_at: i64,
        reason: &str,
    ) -> MemoryConnection {
        MemoryConnection {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source.id.clone(),
            target_id: target.id.clone(),
            connection_type,
            strength,
            created_at,
            reason: Some(reason.to_string()),
            metadata: Default::default(),
        }
    }

    async fn classify_with_llm(
        &self,
        source: &Memory,
        candidate: &Memory,
        similarity: f32,
        now: i64,
        chat: &dyn Chat,
        cost_tracker: Option<&CostTracker>,
    ) -> Result<Option<MemoryConnection>> {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "relationship": {
                    "type": "string",
                    "enum": ["similar", "related", "causes", "part_of", "opposite", "none"]
                }
            },
            "required": ["relationship"]
        });
        let messages = vec![
            ChatMessage::system(
                "Classify the relationship between two memories. Respond with one of: \
                 similar, related, causes, part_of, opposite, none.",
            ),
            ChatMessage::user(format!(
                "Memory A: {}\nMemory B: {}",
                source.content, candidate.content
            )),
        ];
        let options = GenerateOptions {
            temperature: self.detection.temperature,
            max_tokens: self.detection.max_tokens,
        };
        let result = chat.generate_object(&schema, &messages, &options).await?;
        if let Some(tracker) = cost_tracker {
            tracker.record_tokens(
                CONNECTIONS_COST_COMPONENT,
                result.usage.prompt_tokens,
                result.usage.completion_tokens,
            );
        }

        let relationship = result
            .object
            .get("relationship")
            .and_then(|v| v.as_str())
            .unwrap_or("none");

        let connection_type = match relationship {
            "similar" => ConnectionType::Similar,
            "related" => ConnectionType::Related,
            "causes" => ConnectionType::Causes,
            "part_of" => ConnectionType::PartOf,
            "opposite" => ConnectionType::Opposite,
            _ => return Ok(None),
        };

        Ok(Some(self.build_connection(
            source,
            candidate,
            connection_type,
            similarity,
            now,
            "llm classification in the ambiguous similarity band",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            ConnectionDetectionConfig::default(),
            CostControlConfig::default(),
        )
    }

    #[test]
    fn bands_follow_thresholds() {
        let m = manager();
        assert_eq!(m.classify_band(0.9), SimilarityBand::AutoSimilar);
        assert_eq!(m.classify_band(0.7), SimilarityBand::AutoRelated);
        assert_eq!(m.classify_band(0.4), SimilarityBand::NeedsLlm);
        assert_eq!(m.classify_band(0.1), SimilarityBand::Ignore);
    }

    #[tokio::test]
    async fn auto_similar_needs_no_chat() {
        use crate::model::{MemoryType, NewMemory};
        let m = manager();
        let source = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        let candidate = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        let connections = m
            .discover(&source, &[(candidate, 0.95)], None, None)
            .await
            .unwrap();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].connection_type, ConnectionType::Similar);
    }

    #[tokio::test]
    async fn needs_llm_respects_a_shared_cost_tracker_s_budget() {
        use crate::model::{MemoryType, NewMemory};
        use crate::testing::ScriptedChat;
        let cost_control = CostControlConfig {
            max_llm_calls_per_batch: 1,
            prefer_embedding_when_similar: false,
            ..CostControlConfig::default()
        };
        let m = ConnectionManager::new(ConnectionDetectionConfig::default(), cost_control);
        let cost_tracker = CostTracker::new();
        // Pre-spend the tracker's budget so even the first candidate in this
        // batch is already over the ceiling.
        cost_tracker.record_tokens(CONNECTIONS_COST_COMPONENT, 1, 1);

        let source = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        let candidate = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        let chat = ScriptedChat::new(vec![serde_json::json!({"relationship": "related"})]);
        let connections = m
            .discover(&source, &[(candidate, 0.4)], Some(&chat), Some(&cost_tracker))
            .await
            .unwrap();
        assert!(connections.is_empty());
    }

    #[tokio::test]
    async fn needs_llm_without_chat_is_dropped() {
        use crate::model::{MemoryType, NewMemory};
        let m = manager();
        let source = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        let candidate = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        let connections = m
            .discover(&source, &[(candidate, 0.4)], None, None)
            .await
            .unwrap();
        assert!(connections.is_empty());
    }
}
