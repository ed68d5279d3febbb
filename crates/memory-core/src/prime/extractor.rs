//! Structured extraction against the `Chat` capability.

use serde::Deserialize;

use crate::chat::{Chat, ChatMessage, GenerateOptions};
use crate::error::{MemoryError, Result};
use crate::model::{metadata_keys, MemoryType, NewMemory};
use crate::prime::rules::ExtractionRule;

/// One candidate memory as returned by the extraction model, before it is
/// turned into a `NewMemory` (which requires a concrete `MemoryType`, not a
/// freeform string).
#[derive(Debug, Clone, Deserialize)]
struct ExtractedCandidate {
    #[serde(rename = "type")]
    memory_type: String,
    content: String,
    #[serde(default)]
    importance: f32,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    rule_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    memories: Vec<ExtractedCandidate>,
}

fn extraction_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "memories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": {"type": "string", "enum": ["working", "episodic", "semantic", "procedural"]},
                        "content": {"type": "string"},
                        "importance": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                        "keywords": {"type": "array", "items": {"type": "string"}},
                        "rule_id": {"type": "string"}
                    },
                    "required": ["type", "content", "importance"]
                }
            }
        },
        "required": ["memories"]
    })
}

/// Extracts structured memory candidates from a conversation turn.
pub struct PrimeExtractor;

impl PrimeExtractor {
    pub fn new() -> Self {
        PrimeExtractor
    }

    /// Run one extraction call against `turn_text`, tagging each resulting
    /// `NewMemory` with the extraction tier and, when the model named one,
    /// the rule it matched.
    pub async fn extract(
        &self,
        chat: &dyn Chat,
        turn_text: &str,
        tier: &str,
        rules: &[&ExtractionRule],
        occurred_at: Option<i64>,
        options: &GenerateOptions,
    ) -> Result<(Vec<(MemoryType, NewMemory)>, crate::chat::Usage)> {
        let rule_descriptions: Vec<String> = rules
            .iter()
            .map(|r| format!("- {} ({}): {}", r.id, r.target_type, r.description))
            .collect();
        let system_prompt = format!(
            "Extract durable memories from the conversation turn below. \
             Consider these extraction rules:\n{}\n\
             Only extract what is actually stated; do not invent detail.",
            rule_descriptions.join("\n")
        );
        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(turn_text)];

        let schema = extraction_schema();
        let result = chat.generate_object(&schema, &messages, options).await?;
        let response: ExtractionResponse = serde_json::from_value(result.object).map_err(|err| {
            MemoryError::permanent("PrimeExtractor::extract", None, format!("malformed extraction response: {err}"))
        })?;

        let mut out = Vec::with_capacity(response.memories.len());
        for candidate in response.memories {
            let memory_type: MemoryType = candidate
                .memory_type
                .parse()
                .map_err(|err| MemoryError::permanent("PrimeExtractor::extract", None, err))?;

            let mut metadata = std::collections::HashMap::new();
            metadata.insert(
                metadata_keys::EXTRACTION_METHOD.to_string(),
                serde_json::Value::String("prime".to_string()),
            );
            metadata.insert(metadata_keys::TIER.to_string(), serde_json::Value::String(tier.to_string()));

            let matched_rule = candidate
                .rule_id
                .as_deref()
                .and_then(|rule_id| rules.iter().find(|r| r.id == rule_id));
            if let Some(rule_id) = &candidate.rule_id {
                metadata.insert(metadata_keys::RULE_ID.to_string(), serde_json::Value::String(rule_id.clone()));
            }
            if let Some(occurred_at) = occurred_at {
                metadata.insert(
                    metadata_keys::ORIGINAL_CONVERSATION_DATE.to_string(),
                    serde_json::Value::Number(occurred_at.into()),
                );
            }

            let (never_decay, custom_half_life_days, reinforceable) = matched_rule
                .map(|r| (r.never_decay, r.custom_half_life_days, r.reinforceable))
                .unwrap_or((false, None, true));

            let new_memory = NewMemory {
                content: candidate.content,
                keywords: (!candidate.keywords.is_empty()).then_some(candidate.keywords),
                importance: candidate.importance.clamp(0.0, 1.0),
                never_decay,
                custom_half_life_days,
                reinforceable,
                metadata,
                occurred_at,
                ..Default::default()
            };
            out.push((memory_type, new_memory));
        }

        Ok((out, result.usage))
    }
}

impl Default for PrimeExtractor {
    fn default() -> Self {
        Self::new()
    }
}
