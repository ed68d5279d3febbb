//! Per-type memory policy layers
//!
//! Each `MemoryType` enforces its own invariants on top of the ones already
//! checked by `Memory::new` — Working memory requires a `session_id` and
//! caps context size, Episodic caps memories per session, Semantic applies
//! a deduplication threshold, Procedural tracks a success rate. These
//! structs hold no storage handle; they are pure policy wrapped around the
//! matching config section, kept separate from the capability that
//! actually persists a memory.

mod episodic;
mod procedural;
mod semantic;
mod working;

pub use episodic::EpisodicPolicy;
pub use procedural::ProceduralPolicy;
pub use semantic::SemanticPolicy;
pub use working::WorkingPolicy;

use crate::config::MemoryTypeConfig;
use crate::error::Result;
use crate::model::{Memory, MemoryType, NewMemory};

/// Dispatches to the right per-type policy for validation before a memory is
/// constructed. `MemoryManager::store` calls this so every insertion path
/// goes through the same type-specific checks regardless of caller.
#[derive(Debug, Clone)]
pub struct TypePolicies {
    pub working: WorkingPolicy,
    pub episodic: EpisodicPolicy,
    pub semantic: SemanticPolicy,
    pub procedural: ProceduralPolicy,
}

impl TypePolicies {
    pub fn from_config(config: &MemoryTypeConfig) -> Self {
        TypePolicies {
            working: WorkingPolicy::new(config.working.clone()),
            episodic: EpisodicPolicy::new(config.episodic.clone()),
            semantic: SemanticPolicy::new(config.semantic.clone()),
            procedural: ProceduralPolicy::new(config.procedural.clone()),
        }
    }

    /// Validate `input` against the invariants of `memory_type` before
    /// `Memory::new` is called. Invariant 6 (Working memory requires a
    /// session) lives here rather than in `Memory::new` because it's
    /// type-specific, not universal.
    pub fn validate_new(&self, memory_type: MemoryType, input: &NewMemory) -> Result<()> {
        match memory_type {
            MemoryType::Working => self.working.validate_new(input),
            MemoryType::Episodic => self.episodic.validate_new(input),
            MemoryType::Semantic => self.semantic.validate_new(input),
            MemoryType::Procedural => self.procedural.validate_new(input),
        }
    }

    /// Whether a freshly-built memory should be accepted into store,
    /// evaluated against the owning type's admission policy (e.g. Episodic's
    /// `importance_threshold`).
    pub fn should_admit(&self, memory: &Memory) -> bool {
        match memory.memory_type {
            MemoryType::Working => true,
            MemoryType::Episodic => self.episodic.should_admit(memory),
            MemoryType::Semantic => self.semantic.should_admit(memory),
            MemoryType::Procedural => self.procedural.should_admit(memory),
        }
    }
}
