//! # Agent Memory Core
//!
//! A persistent memory engine for conversational agents: four memory types
//! (working, episodic, semantic, procedural) with lazy resonance decay,
//! connection discovery, structured extraction (PRIME), consolidation, and
//! weighted hybrid recall.
//!
//! The engine is storage-, embedding-, and LLM-agnostic. It is built over
//! three capability traits — [`provider::StorageProvider`],
//! [`embedder::Embedder`], and [`chat::Chat`] — rather than a concrete
//! database or model client; a caller supplies implementations of those
//! traits and gets a [`manager::MemoryManager`] facade back.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agent_memory_core::{MemoryConfig, MemoryManager, NewMemory, MemoryType};
//!
//! # async fn run(provider: Arc<dyn agent_memory_core::StorageProvider>) -> agent_memory_core::Result<()> {
//! let manager = MemoryManager::new(provider, None, None, MemoryConfig::default())?;
//! let memory = manager
//!     .store("user-1", "agent-1", MemoryType::Semantic, NewMemory {
//!         content: "Rust's ownership model prevents data races at compile time".into(),
//!         importance: 0.8,
//!         ..Default::default()
//!     })
//!     .await?;
//! # let _ = memory;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod connections;
pub mod consolidation;
pub mod cost;
pub mod decay;
pub mod embedder;
pub mod error;
pub mod manager;
pub mod model;
pub mod prime;
pub mod provider;
pub mod search;
pub mod temporal;
pub mod testing;
pub mod transaction;
pub mod types;

/// Crate version, re-exported so embedders can report provenance without a
/// direct dependency on `env!("CARGO_PKG_VERSION")`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use chat::{Chat, ChatError, ChatMessage, ChatRole, GenerateOptions, GeneratedObject, Usage};
pub use config::MemoryConfig;
pub use embedder::{cosine_similarity, Embedder, EmbeddingResult};
pub use error::{MemoryError, Result};
pub use manager::MemoryManager;
pub use model::{
    Memory, MemoryConnection, MemoryEvent, MemoryEventKind, MemoryStatus, MemoryType, NewMemory,
};
pub use provider::{
    BatchWriteOutcome, HybridSearchParams, MemoryStats, MemoryUpdate, RecallFilter,
    ScoredCandidate, StorageProvider,
};

/// Re-exports the types most callers need in scope.
pub mod prelude {
    pub use crate::chat::{Chat, ChatMessage, GenerateOptions};
    pub use crate::config::MemoryConfig;
    pub use crate::embedder::Embedder;
    pub use crate::error::{MemoryError, Result};
    pub use crate::manager::MemoryManager;
    pub use crate::model::{Memory, MemoryType, NewMemory};
    pub use crate::provider::StorageProvider;
}
