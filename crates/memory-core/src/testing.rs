//! In-memory test doubles for the three capability traits.
//!
//! Shared by unit tests throughout the crate and by the integration suite
//! under `tests/`: a hand-rolled in-memory fixture per capability trait,
//! rather than re-deriving a mock per test file.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use crate::chat::{Chat, GenerateOptions, GeneratedObject, ChatMessage, Usage};
use crate::embedder::{cosine_similarity, Embedder, EmbeddingResult};
use crate::error::Result;
use crate::model::{Memory, MemoryConnection, MemoryEvent, MemoryType};
use crate::provider::{
    BatchWriteOutcome, HybridSearchParams, MemoryStats, MemoryUpdate, RecallFilter,
    ScoredCandidate, StorageProvider,
};

/// An in-memory [`StorageProvider`] that supports every optional capability,
/// so a single fixture can exercise the full façade.
pub struct InMemoryProvider {
    memories: StdMutex<HashMap<String, Memory>>,
    connections: StdMutex<Vec<MemoryConnection>>,
    events: StdMutex<Vec<MemoryEvent>>,
    embeddings: StdMutex<HashMap<String, Vec<f32>>>,
    applied_updates: StdMutex<HashMap<String, MemoryUpdate>>,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        InMemoryProvider {
            memories: StdMutex::new(HashMap::new()),
            connections: StdMutex::new(Vec::new()),
            events: StdMutex::new(Vec::new()),
            embeddings: StdMutex::new(HashMap::new()),
            applied_updates: StdMutex::new(HashMap::new()),
        }
    }

    pub async fn get_update(&self, memory_id: &str) -> Option<MemoryUpdate> {
        self.applied_updates.lock().unwrap().get(memory_id).map(|u| MemoryUpdate {
            memory_id: u.memory_id.clone(),
            resonance: u.resonance,
            last_accessed_at: u.last_accessed_at,
            access_count: u.access_count,
        })
    }

    pub fn seed(&self, memory: Memory) {
        self.memories.lock().unwrap().insert(memory.id.clone(), memory);
    }

    pub fn seed_embedding(&self, memory_id: &str, vector: Vec<f32>) {
        self.embeddings.lock().unwrap().insert(memory_id.to_string(), vector);
    }

    pub fn connections_snapshot(&self) -> Vec<MemoryConnection> {
        self.connections.lock().unwrap().clone()
    }

    pub fn events_snapshot(&self) -> Vec<MemoryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn memory_count(&self) -> usize {
        self.memories.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageProvider for InMemoryProvider {
    async fn store(&self, memory: &Memory) -> Result<String> {
        self.memories.lock().unwrap().insert(memory.id.clone(), memory.clone());
        Ok(memory.id.clone())
    }

    async fn get_by_id(&self, user_id: &str, agent_id: &str, memory_id: &str) -> Result<Option<Memory>> {
        Ok(self
            .memories
            .lock()
            .unwrap()
            .get(memory_id)
            .filter(|m| m.user_id == user_id && m.agent_id == agent_id)
            .cloned())
    }

    async fn recall(
        &self,
        user_id: &str,
        agent_id: &str,
        query: &str,
        filter: &RecallFilter,
    ) -> Result<Vec<Memory>> {
        let query = query.to_lowercase();
        let mut results: Vec<Memory> = self
            .memories
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.user_id == user_id && m.agent_id == agent_id)
            .filter(|m| filter.include_archived || m.is_active())
            .filter(|m| filter.memory_type.is_none_or(|t| t == m.memory_type))
            .filter(|m| filter.session_id.is_none() || m.session_id == filter.session_id)
            .filter(|m| query == "*" || query.is_empty() || m.content.to_lowercase().contains(&query))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap());
        if filter.limit > 0 {
            results.truncate(filter.limit);
        }
        Ok(results)
    }

    async fn update(&self, memory: &Memory) -> Result<()> {
        self.memories.lock().unwrap().insert(memory.id.clone(), memory.clone());
        Ok(())
    }

    async fn delete(&self, _user_id: &str, _agent_id: &str, memory_id: &str) -> Result<()> {
        self.memories.lock().unwrap().remove(memory_id);
        Ok(())
    }

    async fn get_stats(&self, user_id: &str, agent_id: &str, memory_type: MemoryType) -> Result<MemoryStats> {
        let memories = self.memories.lock().unwrap();
        let matching: Vec<&Memory> = memories
            .values()
            .filter(|m| m.user_id == user_id && m.agent_id == agent_id && m.memory_type == memory_type)
            .collect();
        Ok(MemoryStats {
            count: matching.len() as u64,
            token_sum: matching.iter().filter_map(|m| m.token_count).map(|t| t as u64).sum(),
            expired_count: 0,
            oldest_created_at: matching.iter().map(|m| m.created_at).min(),
            newest_created_at: matching.iter().map(|m| m.created_at).max(),
        })
    }

    fn supports_batch_update(&self) -> bool {
        true
    }

    async fn batch_update_memories(&self, updates: &[MemoryUpdate]) -> Result<Vec<BatchWriteOutcome>> {
        let mut memories = self.memories.lock().unwrap();
        let mut applied = self.applied_updates.lock().unwrap();
        let mut outcomes = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(memory) = memories.get_mut(&update.memory_id) {
                memory.resonance = update.resonance;
                memory.last_accessed_at = update.last_accessed_at;
                memory.access_count = update.access_count;
            }
            applied.insert(update.memory_id.clone(), update.clone());
            outcomes.push(BatchWriteOutcome {
                memory_id: update.memory_id.clone(),
                result: Ok(()),
            });
        }
        Ok(outcomes)
    }

    fn supports_connections(&self) -> bool {
        true
    }

    async fn create_connections(&self, connections: &[MemoryConnection]) -> Result<()> {
        let mut store = self.connections.lock().unwrap();
        for conn in connections {
            conn.validate()?;
            let duplicate = store
                .iter()
                .any(|c| c.source_id == conn.source_id && c.target_id == conn.target_id && c.connection_type == conn.connection_type);
            if !duplicate {
                store.push(conn.clone());
            }
        }
        Ok(())
    }

    async fn find_connected_memories(&self, _user_id: &str, memory_id: &str, _depth: u8) -> Result<Vec<MemoryConnection>> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.source_id == memory_id || c.target_id == memory_id)
            .cloned()
            .collect())
    }

    fn supports_vector_ops(&self) -> bool {
        true
    }

    async fn store_memory_with_embedding(&self, memory: &Memory, embedding: &[f32]) -> Result<String> {
        self.memories.lock().unwrap().insert(memory.id.clone(), memory.clone());
        self.embeddings.lock().unwrap().insert(memory.id.clone(), embedding.to_vec());
        Ok(memory.id.clone())
    }

    async fn search_by_vector(
        &self,
        user_id: &str,
        agent_id: &str,
        query_vector: &[f32],
        filter: &RecallFilter,
    ) -> Result<Vec<ScoredCandidate>> {
        let memories = self.memories.lock().unwrap();
        let embeddings = self.embeddings.lock().unwrap();
        let mut scored: Vec<ScoredCandidate> = memories
            .values()
            .filter(|m| m.user_id == user_id && m.agent_id == agent_id)
            .filter(|m| filter.include_archived || m.is_active())
            .filter_map(|m| {
                embeddings.get(&m.id).map(|v| ScoredCandidate {
                    memory: m.clone(),
                    vector_score: Some(cosine_similarity(query_vector, v)),
                    text_score: None,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.vector_score.partial_cmp(&a.vector_score).unwrap());
        if filter.limit > 0 {
            scored.truncate(filter.limit);
        }
        Ok(scored)
    }

    async fn find_similar_memories(
        &self,
        user_id: &str,
        memory_id: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredCandidate>> {
        let target_vec = self.embeddings.lock().unwrap().get(memory_id).cloned();
        let Some(target_vec) = target_vec else {
            return Ok(Vec::new());
        };
        let memories = self.memories.lock().unwrap();
        let embeddings = self.embeddings.lock().unwrap();
        let mut scored: Vec<ScoredCandidate> = memories
            .values()
            .filter(|m| m.user_id == user_id && m.id != memory_id)
            .filter_map(|m| {
                embeddings.get(&m.id).map(|v| (m, cosine_similarity(&target_vec, v)))
            })
            .filter(|(_, sim)| *sim >= min_similarity)
            .map(|(m, sim)| ScoredCandidate {
                memory: m.clone(),
                vector_score: Some(sim),
                text_score: None,
            })
            .collect();
        scored.sort_by(|a, b| b.vector_score.partial_cmp(&a.vector_score).unwrap());
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn update_memory_embedding(&self, memory_id: &str, embedding: &[f32]) -> Result<()> {
        self.embeddings.lock().unwrap().insert(memory_id.to_string(), embedding.to_vec());
        Ok(())
    }

    fn supports_hybrid_search(&self) -> bool {
        true
    }

    async fn hybrid_search(
        &self,
        user_id: &str,
        agent_id: &str,
        query_text: &str,
        query_vector: Option<&[f32]>,
        params: &HybridSearchParams,
    ) -> Result<Vec<ScoredCandidate>> {
        let query = query_text.to_lowercase();
        let memories = self.memories.lock().unwrap();
        let embeddings = self.embeddings.lock().unwrap();
        let mut scored: Vec<ScoredCandidate> = memories
            .values()
            .filter(|m| m.user_id == user_id && m.agent_id == agent_id)
            .filter(|m| params.filter.include_archived || m.is_active())
            .filter(|m| params.filter.memory_type.is_none_or(|t| t == m.memory_type))
            .filter(|m| params.filter.session_id.is_none() || m.session_id == params.filter.session_id)
            .map(|m| {
                let text_score = if query == "*" || query.is_empty() || m.content.to_lowercase().contains(&query) {
                    1.0
                } else {
                    0.0
                };
                let vector_score = query_vector.and_then(|qv| embeddings.get(&m.id).map(|v| cosine_similarity(qv, v)));
                ScoredCandidate {
                    memory: m.clone(),
                    vector_score,
                    text_score: Some(text_score),
                }
            })
            .filter(|c| {
                let fused = c.text_score.unwrap_or(0.0) * params.text_weight
                    + c.vector_score.unwrap_or(0.0) * params.vector_weight;
                fused >= params.threshold
            })
            .collect();
        scored.sort_by(|a, b| {
            let fused_a = a.text_score.unwrap_or(0.0) * params.text_weight + a.vector_score.unwrap_or(0.0) * params.vector_weight;
            let fused_b = b.text_score.unwrap_or(0.0) * params.text_weight + b.vector_score.unwrap_or(0.0) * params.vector_weight;
            fused_b.partial_cmp(&fused_a).unwrap()
        });
        if params.filter.limit > 0 {
            scored.truncate(params.filter.limit);
        }
        Ok(scored)
    }

    fn supports_evolution_events(&self) -> bool {
        true
    }

    async fn track_event(&self, event: &MemoryEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn track_event_batch(&self, events: &[MemoryEvent]) -> Result<()> {
        self.events.lock().unwrap().extend_from_slice(events);
        Ok(())
    }

    async fn get_evolution_history(&self, memory_id: &str) -> Result<Vec<MemoryEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.memory_id == memory_id)
            .cloned()
            .collect())
    }
}

/// A deterministic [`Embedder`] double: hashes the text into a small fixed
/// vector so semantically-similar fixture strings (sharing prefixes/words in
/// tests) can be authored to land close together.
pub struct FakeEmbedder {
    pub dimensions: usize,
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        FakeEmbedder { dimensions: 8 }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimensions] += byte as f32;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(EmbeddingResult {
            vector,
            provider: "fake".to_string(),
            model: "fake-hash".to_string(),
            dimensions: self.dimensions,
        })
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }
}

/// A scripted [`Chat`] double that returns a pre-baked JSON value regardless
/// of input, so extraction/classification tests are deterministic.
pub struct ScriptedChat {
    responses: StdMutex<Vec<serde_json::Value>>,
    pub calls: StdMutex<u32>,
}

impl ScriptedChat {
    pub fn new(responses: Vec<serde_json::Value>) -> Self {
        ScriptedChat {
            responses: StdMutex::new(responses),
            calls: StdMutex::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Chat for ScriptedChat {
    async fn generate_object(
        &self,
        _schema: &serde_json::Value,
        _messages: &[ChatMessage],
        _options: &GenerateOptions,
    ) -> Result<GeneratedObject<serde_json::Value>> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        let object = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses.first().cloned().unwrap_or(serde_json::json!({}))
        };
        Ok(GeneratedObject {
            object,
            usage: Usage {
                prompt_tokens: 32,
                completion_tokens: 16,
            },
        })
    }
}
