//! Extraction rules
//!
//! A rule names what kind of memory to look for in a conversation turn and
//! which memory type it should land as. Rules are the unit PRIME's tier
//! selection counts (`advanced_min_rules`) — more applicable rules
//! implies a denser turn, which is worth the advanced tier's larger prompt.

use crate::model::MemoryType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionRule {
    pub id: &'static str,
    pub description: &'static str,
    pub target_type: MemoryType,
    /// Decay lifecycle defaults a matched candidate inherits: see
    /// `Memory`'s own fields of the same name.
    pub never_decay: bool,
    pub custom_half_life_days: Option<f64>,
    pub reinforceable: bool,
}

/// The default rule set, covering one rule per memory type plus a
/// preference-detection rule (a common cross-cutting pattern: explicit
/// user preferences get filed as semantic facts regardless of what the
/// surrounding turn was about).
pub const DEFAULT_RULES: &[ExtractionRule] = &[
    ExtractionRule {
        id: "episodic.event",
        description: "A specific thing that happened in this conversation",
        target_type: MemoryType::Episodic,
        never_decay: false,
        custom_half_life_days: None,
        reinforceable: true,
    },
    ExtractionRule {
        id: "semantic.fact",
        description: "A general fact or piece of domain knowledge stated as true",
        target_type: MemoryType::Semantic,
        never_decay: false,
        custom_half_life_days: None,
        reinforceable: true,
    },
    ExtractionRule {
        id: "semantic.preference",
        description: "An explicit user preference or stated opinion",
        target_type: MemoryType::Semantic,
        never_decay: true,
        custom_half_life_days: None,
        reinforceable: true,
    },
    ExtractionRule {
        id: "procedural.howto",
        description: "A reusable method, workflow, or pattern for accomplishing a task",
        target_type: MemoryType::Procedural,
        never_decay: false,
        custom_half_life_days: Some(180.0),
        reinforceable: true,
    },
];

/// Naive applicability check: does `turn_text` contain language suggestive
/// of this rule's category? This is a cheap pre-filter used for tier
/// selection (`advanced_min_rules`), not the extraction itself — the
/// extraction model makes the real judgment call.
pub fn applicable_rules(turn_text: &str) -> Vec<&'static ExtractionRule> {
    let lower = turn_text.to_lowercase();
    DEFAULT_RULES
        .iter()
        .filter(|rule| match rule.id {
            "episodic.event" => lower.contains("happened") || lower.contains("i did") || lower.contains("we "),
            "semantic.fact" => lower.contains("is a") || lower.contains("always") || lower.contains("fact"),
            "semantic.preference" => {
                lower.contains("i prefer") || lower.contains("i like") || lower.contains("i want")
            }
            "procedural.howto" => {
                lower.contains("how to") || lower.contains("step") || lower.contains("first,") || lower.contains("workflow")
            }
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_preference_rule() {
        let rules = applicable_rules("I prefer tabs over spaces for this project");
        assert!(rules.iter().any(|r| r.id == "semantic.preference"));
    }

    #[test]
    fn detects_howto_rule() {
        let rules = applicable_rules("Here's how to set up the build: first, install rustup");
        assert!(rules.iter().any(|r| r.id == "procedural.howto"));
    }

    #[test]
    fn plain_text_matches_nothing() {
        let rules = applicable_rules("ok");
        assert!(rules.is_empty());
    }
}
