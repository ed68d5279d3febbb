//! Configuration surface
//!
//! Every nested section is a plain `Default`-deriving struct rather than one
//! monolithic config object. Loading from environment variables or files
//! is out of scope; callers construct
//! `MemoryConfig` directly or via `serde` from their own configuration
//! layer, hence `#[serde(default)]` everywhere.

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingMemoryConfig {
    pub max_tokens: u32,
    pub ttl_seconds: u64,
    pub max_context_items: usize,
    pub compression_threshold: usize,
    pub encrypt_sensitive: bool,
}

impl Default for WorkingMemoryConfig {
    fn default() -> Self {
        WorkingMemoryConfig {
            max_tokens: 4000,
            ttl_seconds: 3600,
            max_context_items: 50,
            compression_threshold: 100,
            encrypt_sensitive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodicMemoryConfig {
    pub max_memories_per_session: usize,
    pub decay_rate: f64,
    pub importance_threshold: f32,
    pub compression_age: u64,
    pub encrypt_sensitive: bool,
}

impl Default for EpisodicMemoryConfig {
    fn default() -> Self {
        EpisodicMemoryConfig {
            max_memories_per_session: 500,
            decay_rate: 1.0,
            importance_threshold: 0.5,
            compression_age: 7 * 24 * 3600,
            encrypt_sensitive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticMemoryConfig {
    pub deduplication_threshold: f32,
    pub max_memories_per_category: usize,
    pub confidence_threshold: f32,
    pub vector_search_enabled: bool,
    pub encrypt_sensitive: bool,
    pub auto_extract_facts: bool,
}

impl Default for SemanticMemoryConfig {
    fn default() -> Self {
        SemanticMemoryConfig {
            deduplication_threshold: 0.85,
            max_memories_per_category: 1000,
            confidence_threshold: 0.6,
            vector_search_enabled: true,
            encrypt_sensitive: false,
            auto_extract_facts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProceduralMemoryConfig {
    pub min_success_rate: f32,
    pub max_patterns_per_category: usize,
    pub decay_rate: f64,
    pub confidence_threshold: f32,
    pub adaptive_learning: bool,
    pub pattern_merging: bool,
}

impl Default for ProceduralMemoryConfig {
    fn default() -> Self {
        ProceduralMemoryConfig {
            min_success_rate: 0.5,
            max_patterns_per_category: 200,
            decay_rate: 0.0,
            confidence_threshold: 0.7,
            adaptive_learning: true,
            pattern_merging: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTypeConfig {
    pub working: WorkingMemoryConfig,
    pub episodic: EpisodicMemoryConfig,
    pub semantic: SemanticMemoryConfig,
    pub procedural: ProceduralMemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub similarity_threshold: f32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            enabled: true,
            provider: "default".to_string(),
            model: "default".to_string(),
            similarity_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionThresholds {
    pub auto_similar: f32,
    pub auto_related: f32,
    pub llm_required: f32,
}

impl Default for ConnectionThresholds {
    fn default() -> Self {
        ConnectionThresholds {
            auto_similar: 0.8,
            auto_related: 0.6,
            llm_required: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDetectionConfig {
    pub enabled: bool,
    pub thresholds: ConnectionThresholds,
    pub max_candidates: usize,
    pub batch_size: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ConnectionDetectionConfig {
    fn default() -> Self {
        ConnectionDetectionConfig {
            enabled: true,
            thresholds: ConnectionThresholds::default(),
            max_candidates: 20,
            batch_size: 10,
            temperature: 0.2,
            max_tokens: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostControlConfig {
    pub max_llm_calls_per_batch: u32,
    pub prefer_embedding_when_similar: bool,
    pub track_token_usage: bool,
}

impl Default for CostControlConfig {
    fn default() -> Self {
        CostControlConfig {
            max_llm_calls_per_batch: 5,
            prefer_embedding_when_similar: true,
            track_token_usage: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligenceConfig {
    pub embedding: EmbeddingConfig,
    pub connection_detection: ConnectionDetectionConfig,
    pub cost_control: CostControlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub advanced_min_chars: usize,
    pub advanced_min_rules: usize,
}

impl Default for TierThresholds {
    fn default() -> Self {
        TierThresholds {
            advanced_min_chars: 500,
            advanced_min_rules: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimeConfig {
    pub provider: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub default_tier: String,
    pub auto_tier_selection: bool,
    pub standard_model: String,
    pub advanced_model: String,
    pub temperature: f32,
    pub default_importance_threshold: f32,
    pub tier_thresholds: TierThresholds,
    /// Lifetime ceiling on extraction calls this tracker will allow for the
    /// `prime` cost component before `PrimeOrchestrator::run` refuses to
    /// spend another one.
    pub max_llm_calls: u64,
}

impl Default for PrimeConfig {
    fn default() -> Self {
        PrimeConfig {
            provider: String::new(),
            api_key: String::new(),
            max_tokens: 1024,
            default_tier: "standard".to_string(),
            auto_tier_selection: true,
            standard_model: "standard".to_string(),
            advanced_model: "advanced".to_string(),
            temperature: 0.2,
            default_importance_threshold: 0.3,
            tier_thresholds: TierThresholds::default(),
            max_llm_calls: 1000,
        }
    }
}

/// A named quadruple of fusion weights (vector, text, temporal, procedural).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecallWeights {
    pub vector: f32,
    pub text: f32,
    pub temporal: f32,
    pub procedural: f32,
}

impl RecallWeights {
    /// Weights must sum to 1, within floating-point slop.
    pub fn validate(&self) -> Result<()> {
        let sum = self.vector + self.text + self.temporal + self.procedural;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(MemoryError::invalid(
                "RecallWeights::validate",
                format!("weights must sum to 1.0, got {sum}"),
            ));
        }
        for (name, w) in [
            ("vector", self.vector),
            ("text", self.text),
            ("temporal", self.temporal),
            ("procedural", self.procedural),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(MemoryError::invalid(
                    "RecallWeights::validate",
                    format!("weight {name}={w} is outside [0,1]"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallPresets {
    pub default: RecallWeights,
    pub precision: RecallWeights,
    pub performance: RecallWeights,
    pub research: RecallWeights,
}

impl Default for RecallPresets {
    fn default() -> Self {
        RecallPresets {
            default: RecallWeights {
                vector: 0.30,
                text: 0.30,
                temporal: 0.20,
                procedural: 0.20,
            },
            precision: RecallWeights {
                vector: 0.25,
                text: 0.45,
                temporal: 0.20,
                procedural: 0.10,
            },
            performance: RecallWeights {
                vector: 0.20,
                text: 0.50,
                temporal: 0.25,
                procedural: 0.05,
            },
            research: RecallWeights {
                vector: 0.45,
                text: 0.25,
                temporal: 0.20,
                procedural: 0.10,
            },
        }
    }
}

impl RecallPresets {
    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        self.precision.validate()?;
        self.performance.validate()?;
        self.research.validate()?;
        Ok(())
    }
}

/// Top-level recognized configuration surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub memory: MemoryTypeConfig,
    pub intelligence: IntelligenceConfig,
    pub prime: PrimeConfig,
    pub recall_presets: RecallPresets,
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        self.recall_presets.validate()
    }
}
