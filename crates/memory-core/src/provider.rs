//! `StorageProvider` capability
//!
//! The engine never talks to a concrete database. Instead it is constructed
//! over an `Arc<dyn StorageProvider>` supplied by the caller — a SQLite,
//! Postgres, MongoDB, or S3-backed implementation all satisfy the same
//! trait. Capabilities here are explicit trait methods rather than
//! runtime method-presence checks, so a provider's supported feature set
//! is known at construction time, not rediscovered on first use.
//!
//! Optional capabilities (vector ops, hybrid search, evolution events) are
//! modeled as methods returning `Err(MemoryError::NotSupported)` by default,
//! so a provider only needs to override what it actually implements.

use async_trait::async_trait;

use crate::error::{MemoryError, Result};
use crate::model::{Memory, MemoryConnection, MemoryEvent, MemoryType};

/// Optional filter applied to a `recall` call.
#[derive(Debug, Clone, Default)]
pub struct RecallFilter {
    pub memory_type: Option<MemoryType>,
    pub session_id: Option<String>,
    pub include_archived: bool,
    pub limit: usize,
}

/// A coalesced update produced by the lazy decay pipeline.
#[derive(Debug, Clone)]
pub struct MemoryUpdate {
    pub memory_id: String,
    pub resonance: f32,
    pub last_accessed_at: i64,
    pub access_count: u64,
}

/// Per-type/user aggregate statistics.
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub count: u64,
    pub token_sum: u64,
    pub expired_count: u64,
    pub oldest_created_at: Option<i64>,
    pub newest_created_at: Option<i64>,
}

/// Parameters for a provider-native hybrid search, if it advertises one.
#[derive(Debug, Clone)]
pub struct HybridSearchParams {
    pub text_weight: f32,
    pub vector_weight: f32,
    pub threshold: f32,
    pub filter: RecallFilter,
}

/// A single candidate returned by vector or hybrid search, carrying the raw
/// per-source similarity so hybrid fusion can weight it.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub memory: Memory,
    pub vector_score: Option<f32>,
    pub text_score: Option<f32>,
}

/// Outcome of a batched write, one entry per input update, so a partial
/// failure in one chunk never hides the fate of another.
#[derive(Debug, Clone)]
pub struct BatchWriteOutcome {
    pub memory_id: String,
    pub result: std::result::Result<(), String>,
}

/// The storage capability the core consumes.
///
/// A provider that cannot satisfy the mandatory memory operations must fail
/// at construction time (checked once by whoever builds the
/// `MemoryManager`), not on first use.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    // ---- mandatory memory ops --------------------------------------------
    async fn store(&self, memory: &Memory) -> Result<String>;

    async fn get_by_id(&self, user_id: &str, agent_id: &str, memory_id: &str) -> Result<Option<Memory>>;

    async fn recall(
        &self,
        user_id: &str,
        agent_id: &str,
        query: &str,
        filter: &RecallFilter,
    ) -> Result<Vec<Memory>>;

    async fn update(&self, memory: &Memory) -> Result<()>;

    async fn delete(&self, user_id: &str, agent_id: &str, memory_id: &str) -> Result<()>;

    async fn get_stats(
        &self,
        user_id: &str,
        agent_id: &str,
        memory_type: MemoryType,
    ) -> Result<MemoryStats>;

    // ---- optional: batched decay writes ---------------------------
    fn supports_batch_update(&self) -> bool {
        false
    }

    async fn batch_update_memories(&self, _updates: &[MemoryUpdate]) -> Result<Vec<BatchWriteOutcome>> {
        Err(MemoryError::not_supported("StorageProvider", "batch_update_memories"))
    }

    // ---- optional: connections -------------------------------------
    fn supports_connections(&self) -> bool {
        false
    }

    async fn create_connections(&self, _connections: &[MemoryConnection]) -> Result<()> {
        Err(MemoryError::not_supported("StorageProvider", "create_connections"))
    }

    async fn find_connected_memories(
        &self,
        _user_id: &str,
        _memory_id: &str,
        _depth: u8,
    ) -> Result<Vec<MemoryConnection>> {
        Err(MemoryError::not_supported("StorageProvider", "find_connected_memories"))
    }

    // ---- optional: vector ops -----------------------------------------------
    fn supports_vector_ops(&self) -> bool {
        false
    }

    async fn store_memory_with_embedding(&self, _memory: &Memory, _embedding: &[f32]) -> Result<String> {
        Err(MemoryError::not_supported("StorageProvider", "store_memory_with_embedding"))
    }

    async fn search_by_vector(
        &self,
        _user_id: &str,
        _agent_id: &str,
        _query_vector: &[f32],
        _filter: &RecallFilter,
    ) -> Result<Vec<ScoredCandidate>> {
        Err(MemoryError::not_supported("StorageProvider", "search_by_vector"))
    }

    async fn find_similar_memories(
        &self,
        _user_id: &str,
        _memory_id: &str,
        _top_k: usize,
        _min_similarity: f32,
    ) -> Result<Vec<ScoredCandidate>> {
        Err(MemoryError::not_supported("StorageProvider", "find_similar_memories"))
    }

    async fn update_memory_embedding(&self, _memory_id: &str, _embedding: &[f32]) -> Result<()> {
        Err(MemoryError::not_supported("StorageProvider", "update_memory_embedding"))
    }

    // ---- optional: provider-native hybrid search ---------------------------
    fn supports_hybrid_search(&self) -> bool {
        false
    }

    async fn hybrid_search(
        &self,
        _user_id: &str,
        _agent_id: &str,
        _query_text: &str,
        _query_vector: Option<&[f32]>,
        _params: &HybridSearchParams,
    ) -> Result<Vec<ScoredCandidate>> {
        Err(MemoryError::not_supported("StorageProvider", "hybrid_search"))
    }

    // ---- optional: evolution events (telemetry) ----------------------------
    fn supports_evolution_events(&self) -> bool {
        false
    }

    async fn track_event(&self, _event: &MemoryEvent) -> Result<()> {
        Err(MemoryError::not_supported("StorageProvider", "track_event"))
    }

    async fn track_event_batch(&self, _events: &[MemoryEvent]) -> Result<()> {
        Err(MemoryError::not_supported("StorageProvider", "track_event_batch"))
    }

    async fn get_evolution_history(&self, _memory_id: &str) -> Result<Vec<MemoryEvent>> {
        Err(MemoryError::not_supported("StorageProvider", "get_evolution_history"))
    }

    /// Release any resources held by the provider. Called once by
    /// `MemoryManager::close`.
    async fn destroy(&self) -> Result<()> {
        Ok(())
    }
}
