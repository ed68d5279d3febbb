//! Connection discovery
//!
//! Smart triage over embedding similarity: memories above `auto_similar`
//! are linked without a model call, memories above `auto_related` are
//! linked as `Related`, memories in the `llm_required` band are classified
//! by an optional `Chat` capability under a per-batch call budget, and
//! anything below `llm_required` is dropped — cheap signal first,
//! expensive model call only when the cheap signal is ambiguous.

mod manager;
mod queue;

pub use manager::{ConnectionManager, SimilarityBand};
pub use queue::{DiscoveryQueue, DiscoveryTask};
