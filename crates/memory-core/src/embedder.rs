//! `Embedder` capability
//!
//! A capability trait any embedding provider can satisfy, whether it wraps
//! a local ONNX model or a hosted embeddings API. Batching and caching
//! remain a provider concern — the core only calls `embed`.

use async_trait::async_trait;

use crate::error::Result;

/// A single embedding result with enough provenance to attribute cost and
/// debug dimension mismatches.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

/// The embedding capability the core consumes.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingResult>;

    /// Fixed output dimensionality, when known ahead of a call.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
/// Shared by connection discovery and recall fusion.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
