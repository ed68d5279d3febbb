//! Hybrid recall: four-dimensional score fusion plus the
//! orchestration that gathers candidates from a `StorageProvider`.

pub mod fusion;
mod hybrid;

pub use fusion::{procedural_score, rank, text_score, DimensionScores, FusedResult};
pub use hybrid::HybridSearch;
