//! PRIME orchestration: tier selection, retry, and cost accounting

use tracing::warn;

use crate::chat::{Chat, GenerateOptions};
use crate::config::PrimeConfig;
use crate::cost::CostTracker;
use crate::error::{MemoryError, Result};
use crate::model::{MemoryType, NewMemory};
use crate::prime::extractor::PrimeExtractor;
use crate::prime::rules::{applicable_rules, DEFAULT_RULES};

const COST_COMPONENT: &str = "prime";

/// Chooses the standard or advanced extraction tier for a conversation
/// turn. Longer turns and turns matching more extraction rules warrant the
/// larger advanced prompt; everything else uses the
/// cheaper standard tier.
pub fn select_tier(turn_text: &str, config: &PrimeConfig) -> &'static str {
    if !config.auto_tier_selection {
        return if config.default_tier == "advanced" { "advanced" } else { "standard" };
    }
    let rule_count = applicable_rules(turn_text).len();
    if turn_text.chars().count() > config.tier_thresholds.advanced_min_chars
        || rule_count > config.tier_thresholds.advanced_min_rules
    {
        "advanced"
    } else {
        "standard"
    }
}

pub struct PrimeOrchestrator {
    config: PrimeConfig,
    extractor: PrimeExtractor,
    max_retries: u32,
}

impl PrimeOrchestrator {
    pub fn new(config: PrimeConfig) -> Self {
        PrimeOrchestrator {
            config,
            extractor: PrimeExtractor::new(),
            max_retries: 2,
        }
    }

    pub fn config(&self) -> &PrimeConfig {
        &self.config
    }

    /// Run extraction for one turn, selecting a tier, retrying transient
    /// chat failures up to `max_retries` times, and recording token spend
    /// against `cost_tracker`.
    pub async fn run(
        &self,
        chat: &dyn Chat,
        turn_text: &str,
        occurred_at: Option<i64>,
        cost_tracker: &CostTracker,
    ) -> Result<Vec<(MemoryType, NewMemory)>> {
        if turn_text.trim().is_empty() {
            return Err(MemoryError::invalid("PrimeOrchestrator::run", "turn_text must not be empty"));
        }
        cost_tracker.check_budget(COST_COMPONENT, self.config.max_llm_calls)?;

        let tier = select_tier(turn_text, &self.config);
        let rules = applicable_rules(turn_text);
        let rules = if rules.is_empty() { DEFAULT_RULES.iter().collect() } else { rules };

        let options = GenerateOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            match self
                .extractor
                .extract(chat, turn_text, tier, &rules, occurred_at, &options)
                .await
            {
                Ok((memories, usage)) => {
                    cost_tracker.record_tokens(COST_COMPONENT, usage.prompt_tokens, usage.completion_tokens);
                    let filtered = memories
                        .into_iter()
                        .filter(|(_, m)| m.importance >= self.config.default_importance_threshold)
                        .collect();
                    return Ok(filtered);
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    last_err = Some(err);
                    if !retryable || attempt == self.max_retries {
                        break;
                    }
                    warn!(attempt, "prime extraction call failed, retrying");
                }
            }
        }

        Err(last_err.unwrap_or_else(|| MemoryError::permanent("PrimeOrchestrator::run", None, "extraction failed with no error recorded")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_plain_turn_selects_standard() {
        let config = PrimeConfig::default();
        assert_eq!(select_tier("ok, thanks", &config), "standard");
    }

    #[test]
    fn long_turn_selects_advanced() {
        let config = PrimeConfig::default();
        let long_text = "a".repeat(600);
        assert_eq!(select_tier(&long_text, &config), "advanced");
    }

    #[test]
    fn disabled_auto_selection_uses_default_tier() {
        let config = PrimeConfig {
            auto_tier_selection: false,
            default_tier: "advanced".to_string(),
            ..Default::default()
        };
        assert_eq!(select_tier("short", &config), "advanced");
    }

    #[tokio::test]
    async fn run_refuses_once_the_call_budget_is_exhausted() {
        use crate::testing::ScriptedChat;

        let config = PrimeConfig {
            max_llm_calls: 1,
            ..Default::default()
        };
        let orchestrator = PrimeOrchestrator::new(config);
        let cost_tracker = CostTracker::new();
        cost_tracker.record_tokens(COST_COMPONENT, 10, 10);

        let chat = ScriptedChat::new(vec![serde_json::json!({"memories": []})]);
        let result = orchestrator.run(&chat, "some turn text", None, &cost_tracker).await;
        assert!(matches!(result, Err(MemoryError::Budget { .. })));
    }
}
