//! Core data model — `Memory`, `MemoryConnection`, `MemoryEvent`
//!
//! `Memory` is the primary entity every
//! other component reads and writes through the `StorageProvider` capability;
//! this module only defines shape and the invariants that can be checked
//! without I/O. Timestamps are milliseconds since the Unix epoch, matching
//! the wire/storage contract rather than a `DateTime<Utc>`, since providers
//! persist them as plain integers (see `StorageProvider::store`).

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// Current epoch milliseconds. Centralized so tests can reason about "now"
/// without sprinkling `chrono::Utc::now()` through the codebase.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The four memory categories, each with distinct decay defaults
/// and recall emphasis.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Short-lived conversational context, scoped to a session.
    Working,
    /// Specific events and conversational moments.
    Episodic,
    /// Facts and generalized knowledge.
    Semantic,
    /// How-to knowledge, skills, and patterns.
    Procedural,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Working => "working",
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
        }
    }

    /// Default half-life in days used when `custom_half_life_days` is unset.
    pub fn default_half_life_days(&self) -> f64 {
        match self {
            MemoryType::Working => 7.0,
            MemoryType::Episodic => 30.0,
            MemoryType::Semantic => 90.0,
            MemoryType::Procedural => 365.0,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "working" => Ok(MemoryType::Working),
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// Lifecycle status of a memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    #[default]
    Active,
    Archived,
}

/// Reserved metadata keys the rest of the crate writes/reads by convention.
/// Providers treat `metadata` as an opaque map; these constants exist so
/// every component agrees on the spelling.
pub mod metadata_keys {
    pub const ORIGINAL_CONVERSATION_DATE: &str = "original_conversation_date";
    pub const EXTRACTION_METHOD: &str = "extraction_method";
    pub const TIER: &str = "tier";
    pub const RULE_ID: &str = "rule_id";
    pub const TEMPORAL_INSIGHTS: &str = "temporal_insights";
    pub const MERGED_FROM: &str = "merged_from";
}

/// The primary memory entity.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub agent_id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,

    pub importance: f32,
    pub resonance: f32,
    pub access_count: u64,

    pub created_at: i64,
    pub updated_at: i64,
    pub last_accessed_at: i64,

    #[serde(default)]
    pub status: MemoryStatus,
    #[serde(default)]
    pub never_decay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_half_life_days: Option<f64>,
    #[serde(default = "default_reinforceable")]
    pub reinforceable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_id: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_reinforceable() -> bool {
    true
}

/// Fields a caller supplies when creating a memory through a `MemoryType`
/// policy layer or the façade's `store` operation. Server-assigned
/// fields (`id`, timestamps, `resonance`, `access_count`) are filled in by
/// the store path.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    pub keywords: Option<Vec<String>>,
    pub session_id: Option<String>,
    pub token_count: Option<u32>,
    pub importance: f32,
    pub never_decay: bool,
    pub custom_half_life_days: Option<f64>,
    pub reinforceable: bool,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Overrides `created_at`/`last_accessed_at` (used by PRIME extraction
    /// to preserve the original message time).
    pub occurred_at: Option<i64>,
}

impl Memory {
    /// Build a new `Active` memory from `NewMemory` fields plus identity and
    /// type, applying the invariants that can be validated without I/O.
    /// Callers (the `MemoryType` policy layers) are responsible for
    /// type-specific requirements such as Working memory's mandatory
    /// `session_id` (Invariant 6).
    pub fn new(
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
        memory_type: MemoryType,
        input: NewMemory,
    ) -> Result<Self> {
        let user_id = user_id.into();
        let agent_id = agent_id.into();
        crate::error::require_scoped("Memory::new", &user_id, &agent_id)?;

        if !(0.0..=1.0).contains(&input.importance) {
            return Err(MemoryError::invalid(
                "Memory::new",
                format!("importance {} is outside [0,1]", input.importance),
            ));
        }
        if let Some(keywords) = &input.keywords {
            if keywords.len() > 20 {
                return Err(MemoryError::invalid(
                    "Memory::new",
                    "keywords must not exceed 20 entries",
                ));
            }
        }

        let now = input.occurred_at.unwrap_or_else(now_ms);
        Ok(Memory {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            agent_id,
            memory_type,
            content: input.content,
            keywords: input.keywords,
            session_id: input.session_id,
            token_count: input.token_count,
            importance: input.importance,
            resonance: 1.0,
            access_count: 0,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            status: MemoryStatus::Active,
            never_decay: input.never_decay,
            custom_half_life_days: input.custom_half_life_days,
            reinforceable: input.reinforceable,
            embedding_id: None,
            metadata: input.metadata,
        })
    }

    /// Invariant 8: timestamps are monotonic at write.
    pub fn touch_updated(&mut self, at: i64) {
        self.updated_at = at.max(self.created_at);
    }

    pub fn touch_accessed(&mut self, at: i64) {
        self.last_accessed_at = at.max(self.created_at);
    }

    pub fn half_life_days(&self) -> f64 {
        self.custom_half_life_days
            .unwrap_or_else(|| self.memory_type.default_half_life_days())
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, MemoryStatus::Active)
    }
}

/// The type of relationship a `MemoryConnection` represents.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Similar,
    Related,
    Causes,
    PartOf,
    Opposite,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Similar => "similar",
            ConnectionType::Related => "related",
            ConnectionType::Causes => "causes",
            ConnectionType::PartOf => "part_of",
            ConnectionType::Opposite => "opposite",
        }
    }
}

/// A discovered or manually created relationship between two memories.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConnection {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    pub strength: f32,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MemoryConnection {
    /// Validate the invariants: distinct endpoints and a strength in
    /// range. Uniqueness of `(source_id, target_id, type)` and same-user
    /// membership are enforced by the façade against provider state, not
    /// here (they require a lookup).
    pub fn validate(&self) -> Result<()> {
        if self.source_id == self.target_id {
            return Err(MemoryError::invalid(
                "MemoryConnection::validate",
                "source_id and target_id must differ",
            ));
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(MemoryError::invalid(
                "MemoryConnection::validate",
                format!("strength {} is outside [0,1]", self.strength),
            ));
        }
        Ok(())
    }
}

/// Lifecycle telemetry emitted as memories move through the system.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryEventKind {
    Created,
    Accessed,
    Updated,
    Decayed,
    Connected,
    Consolidated,
    Deleted,
    Archived,
}

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEvent {
    pub memory_id: String,
    pub user_id: String,
    pub agent_id: String,
    pub kind: MemoryEventKind,
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MemoryEvent {
    pub fn new(
        memory_id: impl Into<String>,
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
        kind: MemoryEventKind,
    ) -> Self {
        MemoryEvent {
            memory_id: memory_id.into(),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            kind,
            timestamp: now_ms(),
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_roundtrip() {
        for t in [
            MemoryType::Working,
            MemoryType::Episodic,
            MemoryType::Semantic,
            MemoryType::Procedural,
        ] {
            assert_eq!(t.as_str().parse::<MemoryType>().unwrap(), t);
        }
    }

    #[test]
    fn new_memory_rejects_empty_ids() {
        let err = Memory::new("", "agent", MemoryType::Semantic, NewMemory::default())
            .expect_err("empty user_id must fail");
        assert!(matches!(err, MemoryError::Invalid { .. }));
    }

    #[test]
    fn new_memory_rejects_out_of_range_importance() {
        let input = NewMemory {
            importance: 1.5,
            ..Default::default()
        };
        let err = Memory::new("u", "a", MemoryType::Semantic, input).unwrap_err();
        assert!(matches!(err, MemoryError::Invalid { .. }));
    }

    #[test]
    fn new_memory_defaults_resonance_to_one() {
        let mem = Memory::new("u", "a", MemoryType::Semantic, NewMemory::default()).unwrap();
        assert_eq!(mem.resonance, 1.0);
        assert_eq!(mem.access_count, 0);
        assert!(mem.is_active());
    }

    #[test]
    fn connection_rejects_self_loop() {
        let conn = MemoryConnection {
            id: "c1".into(),
            source_id: "m1".into(),
            target_id: "m1".into(),
            connection_type: ConnectionType::Similar,
            strength: 0.5,
            created_at: 0,
            reason: None,
            metadata: HashMap::new(),
        };
        assert!(conn.validate().is_err());
    }
}
