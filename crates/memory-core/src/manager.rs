//! `MemoryManager` façade
//!
//! The only component exposed to external collaborators. Every operation
//! validates scoping and content before touching a capability, routes the
//! store path through vector attachment when the provider and an embedder
//! both support it, and wires the lazy decay, connection discovery, PRIME,
//! and consolidation components together behind one roof — a single
//! façade over composed services rather than a pile of free functions the
//! caller has to sequence itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tracing::warn;

use crate::chat::Chat;
use crate::config::{MemoryConfig, RecallWeights};
use crate::connections::{ConnectionManager, DiscoveryQueue};
use crate::consolidation::{
    ConsolidationScheduler, EpisodicPromoter, MergeConfig, MergePlanner, PromotionConfig,
    SchedulerConfig,
};
use crate::cost::CostTracker;
use crate::decay::{BatchError, DecayOutcome, LazyDecayBatchProcessor, LazyDecayCalculator};
use crate::embedder::Embedder;
use crate::error::{require_scoped, MemoryError, Result};
use crate::model::{
    metadata_keys, now_ms, ConnectionType, Memory, MemoryConnection, MemoryEvent, MemoryEventKind,
    MemoryStatus, MemoryType, NewMemory,
};
use crate::prime::PrimeOrchestrator;
use crate::provider::{MemoryStats, MemoryUpdate, RecallFilter, StorageProvider};
use crate::search::{rank, FusedResult, HybridSearch};
use crate::temporal::{CancellationToken, TemporalAnalyzer};
use crate::transaction::Transaction;
use crate::types::TypePolicies;

const DEFAULT_DISCOVERY_QUEUE_LEN: usize = 1_000;
const DEFAULT_DISCOVERY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_DISCOVERY_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_DISCOVERY_MAX_BACKOFF_MS: u64 = 4_000;
const DISCOVERY_DRAIN_POLL_MS: u64 = 500;
const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one `consolidate_memories` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub promoted: usize,
    pub merged: usize,
}

/// Entry point for external collaborators.
pub struct MemoryManager {
    provider: Arc<dyn StorageProvider>,
    embedder: Option<Arc<dyn Embedder>>,
    chat: Option<Arc<dyn Chat>>,
    config: MemoryConfig,
    type_policies: TypePolicies,
    decay_calculator: LazyDecayCalculator,
    batch_processor: Arc<LazyDecayBatchProcessor>,
    connection_manager: ConnectionManager,
    discovery_queue: StdMutex<DiscoveryQueue>,
    prime_orchestrator: PrimeOrchestrator,
    consolidation_scheduler: Arc<ConsolidationScheduler>,
    episodic_promoter: EpisodicPromoter,
    merge_planner: MergePlanner,
    cost_tracker: CostTracker,
    hybrid_search: HybridSearch,
    pending_temporal: StdMutex<Vec<(CancellationToken, tokio::task::JoinHandle<()>)>>,
    discovery_drain_handle: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MemoryManager {
    /// Build a façade over `provider`, starting the decay batch processor's
    /// background flush timer. `embedder`/`chat` are optional: without an
    /// embedder, storage falls back to the plain (non-vector) path; without
    /// a chat capability, `learn` fails with `NotSupported`.
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        embedder: Option<Arc<dyn Embedder>>,
        chat: Option<Arc<dyn Chat>>,
        config: MemoryConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let type_policies = TypePolicies::from_config(&config.memory);
        let batch_processor = LazyDecayBatchProcessor::new(Arc::clone(&provider));
        batch_processor.start();

        let connection_manager = ConnectionManager::new(
            config.intelligence.connection_detection.clone(),
            config.intelligence.cost_control.clone(),
        );
        let merge_planner = MergePlanner::new(MergeConfig {
            similarity_threshold: config.memory.semantic.deduplication_threshold,
        });
        let hybrid_search = HybridSearch::new(Arc::clone(&provider), embedder.clone());
        let prime_orchestrator = PrimeOrchestrator::new(config.prime.clone());

        let this = Arc::new(MemoryManager {
            provider,
            embedder,
            chat,
            decay_calculator: LazyDecayCalculator::new(),
            type_policies,
            batch_processor,
            connection_manager,
            discovery_queue: StdMutex::new(
                DiscoveryQueue::new(DEFAULT_DISCOVERY_QUEUE_LEN, DEFAULT_DISCOVERY_MAX_ATTEMPTS)
                    .with_backoff(DEFAULT_DISCOVERY_BASE_BACKOFF_MS, DEFAULT_DISCOVERY_MAX_BACKOFF_MS),
            ),
            prime_orchestrator,
            consolidation_scheduler: ConsolidationScheduler::new(SchedulerConfig::default()),
            episodic_promoter: EpisodicPromoter::new(PromotionConfig::default()),
            merge_planner,
            cost_tracker: CostTracker::new(),
            hybrid_search,
            pending_temporal: StdMutex::new(Vec::new()),
            discovery_drain_handle: StdMutex::new(None),
            config,
        });
        this.start_discovery_drain();
        Ok(this)
    }

    /// Background consumer for the discovery retry queue: polls for tasks
    /// whose backoff has elapsed and retries the underlying
    /// `create_connections` write, re-queueing on failure (`DiscoveryQueue`
    /// drops a task once it has exhausted its retry budget).
    fn start_discovery_drain(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(DISCOVERY_DRAIN_POLL_MS));
            loop {
                interval.tick().await;
                this.drain_discovery_queue_once().await;
            }
        });
        *self.discovery_drain_handle.lock().unwrap() = Some(handle);
    }

    async fn drain_discovery_queue_once(&self) {
        loop {
            let task = {
                let mut queue = self.discovery_queue.lock().unwrap();
                match queue.dequeue_due() {
                    Some(task) => task,
                    None => break,
                }
            };
            if let Err(err) = self.provider.create_connections(&[task.connection.clone()]).await {
                warn!(error = %err, connection_id = %task.connection.id, "retried connection write failed, re-queueing");
                self.discovery_queue.lock().unwrap().retry(task);
            }
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn cost_tracker(&self) -> &CostTracker {
        &self.cost_tracker
    }

    /// Number of discovered connections waiting for a retried write after a
    /// `create_connections` failure.
    pub fn pending_discovery_tasks(&self) -> usize {
        self.discovery_queue.lock().unwrap().len()
    }

    /// Start the debounced background consolidation pass for one
    /// `(user_id, agent_id)` scope. The scheduler itself is shared across
    /// scopes (per-tenant debounce is simplified to one process-wide
    /// idle window, recorded in DESIGN.md); callers with multiple tenants
    /// should call `consolidate_memories` directly on their own schedule
    /// instead of relying on this for more than one scope.
    pub fn start_consolidation_background(self: &Arc<Self>, user_id: String, agent_id: String) {
        let this = Arc::clone(self);
        self.consolidation_scheduler.start(move || {
            let this = Arc::clone(&this);
            let user_id = user_id.clone();
            let agent_id = agent_id.clone();
            async move {
                if let Err(err) = this.consolidate_memories(&user_id, &agent_id).await {
                    warn!(error = %err, "scheduled consolidation pass failed");
                }
            }
        });
    }

    /// Validate, construct, and persist a memory of `memory_type`. Below
    /// the owning type's admission threshold, the memory is built (so a
    /// `Created` event can still reference its id) but not written to
    /// storage — the caller gets it back as a transient value, not a
    /// durable one.
    pub async fn store(
        &self,
        user_id: &str,
        agent_id: &str,
        memory_type: MemoryType,
        input: NewMemory,
    ) -> Result<Memory> {
        require_scoped("MemoryManager::store", user_id, agent_id)?;
        self.type_policies.validate_new(memory_type, &input)?;
        let memory = Memory::new(user_id, agent_id, memory_type, input)?;

        if !self.type_policies.should_admit(&memory) {
            self.track_event(&memory, MemoryEventKind::Created).await;
            return Ok(memory);
        }

        self.persist(&memory).await?;
        self.track_event(&memory, MemoryEventKind::Created).await;
        self.consolidation_scheduler.record_activity();
        self.discover_connections(&memory).await;
        self.spawn_temporal_analysis(&memory);
        Ok(memory)
    }

    /// Store a memory and its embedding atomically through the `Transaction`
    /// helper: insert, then attach the embedding, rolling back the
    /// insert if attachment fails. Falls back to the plain `store` path when
    /// no embedder is configured or the provider lacks vector ops.
    pub async fn store_with_transaction(
        &self,
        user_id: &str,
        agent_id: &str,
        memory_type: MemoryType,
        input: NewMemory,
    ) -> Result<Memory> {
        require_scoped("MemoryManager::store_with_transaction", user_id, agent_id)?;
        self.type_policies.validate_new(memory_type, &input)?;
        let memory = Memory::new(user_id, agent_id, memory_type, input)?;

        if !self.type_policies.should_admit(&memory) {
            self.track_event(&memory, MemoryEventKind::Created).await;
            return Ok(memory);
        }

        let Some(embedder) = self.embedder.clone() else {
            self.persist(&memory).await?;
            self.track_event(&memory, MemoryEventKind::Created).await;
            self.consolidation_scheduler.record_activity();
            self.discover_connections(&memory).await;
            self.spawn_temporal_analysis(&memory);
            return Ok(memory);
        };
        if !self.provider.supports_vector_ops() {
            self.persist(&memory).await?;
            self.track_event(&memory, MemoryEventKind::Created).await;
            self.consolidation_scheduler.record_activity();
            self.discover_connections(&memory).await;
            self.spawn_temporal_analysis(&memory);
            return Ok(memory);
        }

        let embedding = embedder.embed(&memory.content).await?;

        let mut tx = Transaction::new();
        {
            let provider = Arc::clone(&self.provider);
            let insert = memory.clone();
            tx.step(
                move || {
                    let provider = Arc::clone(&provider);
                    async move { provider.store(&insert).await.map(|_| ()) }
                },
                {
                    let provider = Arc::clone(&self.provider);
                    let user_id = user_id.to_string();
                    let agent_id = agent_id.to_string();
                    let memory_id = memory.id.clone();
                    move || async move {
                        if let Err(err) = provider.delete(&user_id, &agent_id, &memory_id).await {
                            warn!(error = %err, memory_id = %memory_id, "rollback delete failed");
                        }
                    }
                },
            );
        }
        {
            let provider = Arc::clone(&self.provider);
            let memory_id = memory.id.clone();
            let vector = embedding.vector.clone();
            tx.step(
                move || {
                    let provider = Arc::clone(&provider);
                    async move { provider.update_memory_embedding(&memory_id, &vector).await }
                },
                || async {},
            );
        }

        tx.commit(TRANSACTION_TIMEOUT).await?;
        self.track_event(&memory, MemoryEventKind::Created).await;
        self.consolidation_scheduler.record_activity();
        self.discover_connections(&memory).await;
        self.spawn_temporal_analysis(&memory);
        Ok(memory)
    }

    async fn persist(&self, memory: &Memory) -> Result<()> {
        if self.provider.supports_vector_ops() {
            if let Some(embedder) = &self.embedder {
                let embedding = embedder.embed(&memory.content).await?;
                self.provider.store_memory_with_embedding(memory, &embedding.vector).await?;
                return Ok(());
            }
        }
        self.provider.store(memory).await?;
        Ok(())
    }

    async fn track_event(&self, memory: &Memory, kind: MemoryEventKind) {
        if !self.provider.supports_evolution_events() {
            return;
        }
        let event = MemoryEvent::new(memory.id.clone(), memory.user_id.clone(), memory.agent_id.clone(), kind);
        if let Err(err) = self.provider.track_event(&event).await {
            warn!(error = %err, memory_id = %memory.id, "failed to record evolution event");
        }
    }

    /// Smart-triage connection discovery against existing similar memories.
    /// A no-op when the provider lacks vector ops or connections; discovery
    /// failures are logged and, for already-classified connections, queued
    /// for a later retry rather than propagated to the caller.
    async fn discover_connections(&self, memory: &Memory) {
        if !self.provider.supports_vector_ops() || !self.provider.supports_connections() {
            return;
        }
        let max_candidates = self.config.intelligence.connection_detection.max_candidates;
        let candidates = match self
            .provider
            .find_similar_memories(&memory.user_id, &memory.id, max_candidates, 0.0)
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, memory_id = %memory.id, "could not fetch similarity candidates for connection discovery");
                return;
            }
        };
        let pairs: Vec<(Memory, f32)> = candidates
            .into_iter()
            .filter_map(|c| c.vector_score.map(|score| (c.memory, score)))
            .collect();

        let chat: Option<&dyn Chat> = self.chat.as_deref();
        let connections = match self
            .connection_manager
            .discover(memory, &pairs, chat, Some(&self.cost_tracker))
            .await
        {
            Ok(connections) => connections,
            Err(err) => {
                warn!(error = %err, memory_id = %memory.id, "connection discovery failed");
                return;
            }
        };
        if connections.is_empty() {
            return;
        }

        if let Err(err) = self.provider.create_connections(&connections).await {
            warn!(error = %err, "failed to persist discovered connections, queueing for retry");
            let mut queue = self.discovery_queue.lock().unwrap();
            for connection in connections {
                queue.enqueue(connection);
            }
        }
    }

    /// Fire-and-forget temporal pattern analysis over the user's memory set.
    /// Tracked in `pending_temporal` so `close` can cancel it; a
    /// cancelled run returns before touching storage.
    fn spawn_temporal_analysis(&self, memory: &Memory) {
        let provider = Arc::clone(&self.provider);
        let user_id = memory.user_id.clone();
        let agent_id = memory.agent_id.clone();
        let memory_id = memory.id.clone();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let analyzer = TemporalAnalyzer::new();
            let filter = RecallFilter::default();
            let memories = match provider.recall(&user_id, &agent_id, "", &filter).await {
                Ok(memories) => memories,
                Err(err) => {
                    warn!(error = %err, memory_id = %memory_id, "temporal analysis could not load memory set");
                    return;
                }
            };

            let insights = analyzer.analyze(&memories, &task_cancel).await;
            if insights.cancelled {
                return;
            }

            let source = match provider.get_by_id(&user_id, &agent_id, &memory_id).await {
                Ok(Some(source)) => source,
                Ok(None) => return,
                Err(err) => {
                    warn!(error = %err, memory_id = %memory_id, "could not reload memory for temporal insights");
                    return;
                }
            };
            let mut source = source;
            source.metadata.insert(
                metadata_keys::TEMPORAL_INSIGHTS.to_string(),
                serde_json::json!({
                    "active_hours": insights.active_hours,
                    "mean_interval_hours": insights.mean_interval_hours,
                    "memories_scanned": insights.memories_scanned,
                }),
            );
            if let Err(err) = provider.update(&source).await {
                warn!(error = %err, memory_id = %memory_id, "failed to persist temporal insights");
            }
        });

        self.pending_temporal.lock().unwrap().push((cancel, handle));
    }

    /// Hybrid recall across every memory type, applying lazy decay to each
    /// returned memory's resonance and coalescing any resulting update
    /// through the batch processor.
    pub async fn recall(
        &self,
        user_id: &str,
        agent_id: &str,
        query: &str,
        weights: &RecallWeights,
        filter: &RecallFilter,
    ) -> Result<Vec<FusedResult>> {
        require_scoped("MemoryManager::recall", user_id, agent_id)?;
        let now = now_ms();
        let mut results = self.hybrid_search.search(user_id, agent_id, query, weights, filter, now).await?;

        for result in &mut results {
            let outcome = self.decay_calculator.calculate(&result.memory, now);
            result.memory.resonance = outcome.new_resonance;
            if outcome.should_update {
                let access_count = result.memory.access_count.saturating_add(outcome.reinforced as u64);
                result.memory.access_count = access_count;
                result.memory.last_accessed_at = now;
                self.batch_processor
                    .add(MemoryUpdate {
                        memory_id: result.memory.id.clone(),
                        resonance: outcome.new_resonance,
                        last_accessed_at: now,
                        access_count,
                    })
                    .await;
            }
            self.track_event(&result.memory, MemoryEventKind::Accessed).await;
        }

        Ok(results)
    }

    /// Hybrid recall restricted to the two "knowledge" memory types
    /// (Semantic facts, Procedural how-tos), re-ranked across both.
    pub async fn search_knowledge(
        &self,
        user_id: &str,
        agent_id: &str,
        query: &str,
        weights: &RecallWeights,
    ) -> Result<Vec<FusedResult>> {
        require_scoped("MemoryManager::search_knowledge", user_id, agent_id)?;
        let now = now_ms();
        let semantic_filter = RecallFilter {
            memory_type: Some(MemoryType::Semantic),
            ..Default::default()
        };
        let procedural_filter = RecallFilter {
            memory_type: Some(MemoryType::Procedural),
            ..Default::default()
        };
        let mut results = self
            .hybrid_search
            .search(user_id, agent_id, query, weights, &semantic_filter, now)
            .await?;
        results.extend(
            self.hybrid_search
                .search(user_id, agent_id, query, weights, &procedural_filter, now)
                .await?,
        );
        Ok(rank(results))
    }

    /// Recompute decay for a single memory and coalesce the resulting
    /// update, without going through a full recall.
    pub async fn decay(&self, user_id: &str, agent_id: &str, memory_id: &str) -> Result<DecayOutcome> {
        require_scoped("MemoryManager::decay", user_id, agent_id)?;
        let memory = self
            .provider
            .get_by_id(user_id, agent_id, memory_id)
            .await?
            .ok_or_else(|| MemoryError::invalid("MemoryManager::decay", "memory not found"))?;
        let now = now_ms();
        let outcome = self.decay_calculator.calculate(&memory, now);
        if outcome.should_update {
            self.batch_processor
                .add(MemoryUpdate {
                    memory_id: memory.id.clone(),
                    resonance: outcome.new_resonance,
                    last_accessed_at: now,
                    access_count: memory.access_count.saturating_add(outcome.reinforced as u64),
                })
                .await;
        }
        Ok(outcome)
    }

    /// Manually create a connection between two memories, bypassing the
    /// similarity cascade (e.g. a caller-supplied relationship).
    pub async fn create_connection(
        &self,
        source_id: &str,
        target_id: &str,
        connection_type: ConnectionType,
        strength: f32,
        reason: Option<String>,
    ) -> Result<MemoryConnection> {
        if !self.provider.supports_connections() {
            return Err(MemoryError::not_supported("MemoryManager::create_connection", "connections"));
        }
        let connection = MemoryConnection {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            connection_type,
            strength,
            created_at: now_ms(),
            reason,
            metadata: HashMap::new(),
        };
        connection.validate()?;
        self.provider.create_connections(std::slice::from_ref(&connection)).await?;
        Ok(connection)
    }

    pub async fn get_stats(&self, user_id: &str, agent_id: &str, memory_type: MemoryType) -> Result<MemoryStats> {
        require_scoped("MemoryManager::get_stats", user_id, agent_id)?;
        self.provider.get_stats(user_id, agent_id, memory_type).await
    }

    /// Delete every Working memory in `session_id`, returning how many were
    /// removed.
    pub async fn clear_working_memory(&self, user_id: &str, agent_id: &str, session_id: &str) -> Result<u64> {
        require_scoped("MemoryManager::clear_working_memory", user_id, agent_id)?;
        let filter = RecallFilter {
            memory_type: Some(MemoryType::Working),
            session_id: Some(session_id.to_string()),
            include_archived: true,
            limit: 0,
        };
        let memories = self.provider.recall(user_id, agent_id, "*", &filter).await?;
        let mut cleared = 0u64;
        for memory in &memories {
            self.provider.delete(user_id, agent_id, &memory.id).await?;
            cleared += 1;
        }
        Ok(cleared)
    }

    /// PRIME ingestion entry point: extract candidate memories from a
    /// conversation turn and store each one that survives admission.
    /// Per-candidate store failures are logged, not propagated, so one bad
    /// extraction doesn't discard the rest of the turn.
    pub async fn learn(
        &self,
        user_id: &str,
        agent_id: &str,
        turn_text: &str,
        occurred_at: Option<i64>,
    ) -> Result<Vec<Memory>> {
        require_scoped("MemoryManager::learn", user_id, agent_id)?;
        let Some(chat) = &self.chat else {
            return Err(MemoryError::not_supported("MemoryManager::learn", "chat"));
        };
        let candidates = self
            .prime_orchestrator
            .run(chat.as_ref(), turn_text, occurred_at, &self.cost_tracker)
            .await?;

        let mut stored = Vec::with_capacity(candidates.len());
        for (memory_type, new_memory) in candidates {
            match self.store(user_id, agent_id, memory_type, new_memory).await {
                Ok(memory) => stored.push(memory),
                Err(err) => warn!(error = %err, user_id, agent_id, "failed to store a memory extracted by PRIME"),
            }
        }
        Ok(stored)
    }

    /// Find memories similar to `memory_id`, for a "related memories"
    /// recommendation surface.
    pub async fn get_recommendations(&self, user_id: &str, memory_id: &str, top_k: usize) -> Result<Vec<Memory>> {
        if !self.provider.supports_vector_ops() {
            return Err(MemoryError::not_supported("MemoryManager::get_recommendations", "vector_ops"));
        }
        let candidates = self.provider.find_similar_memories(user_id, memory_id, top_k, 0.0).await?;
        Ok(candidates.into_iter().map(|c| c.memory).collect())
    }

    /// The active Working memory context for a session, most-recently
    /// accessed first, bounded by `WorkingMemoryConfig::max_context_items`.
    pub async fn get_working_context(&self, user_id: &str, agent_id: &str, session_id: &str) -> Result<Vec<Memory>> {
        require_scoped("MemoryManager::get_working_context", user_id, agent_id)?;
        let filter = RecallFilter {
            memory_type: Some(MemoryType::Working),
            session_id: Some(session_id.to_string()),
            include_archived: false,
            limit: self.config.memory.working.max_context_items,
        };
        let mut memories = self.provider.recall(user_id, agent_id, "*", &filter).await?;
        memories.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Ok(memories)
    }

    /// Run one consolidation pass: promote frequently-accessed episodic
    /// clusters to semantic facts, then merge near-duplicate semantic
    /// memories. Intended to run on the debounced schedule (see
    /// `start_consolidation_background`), but safe to call directly.
    pub async fn consolidate_memories(&self, user_id: &str, agent_id: &str) -> Result<ConsolidationReport> {
        require_scoped("MemoryManager::consolidate_memories", user_id, agent_id)?;
        let mut report = ConsolidationReport::default();

        let episodic_filter = RecallFilter {
            memory_type: Some(MemoryType::Episodic),
            ..Default::default()
        };
        let episodic = self.provider.recall(user_id, agent_id, "*", &episodic_filter).await?;
        let mut by_session: HashMap<Option<String>, Vec<Memory>> = HashMap::new();
        for memory in episodic {
            by_session.entry(memory.session_id.clone()).or_default().push(memory);
        }
        let now = now_ms();
        for cluster in by_session.into_values() {
            if self.episodic_promoter.should_promote(&cluster, now) {
                let summary = cluster.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join(" ");
                let new_memory = self.episodic_promoter.build_semantic_memory(&cluster, summary);
                if self.store(user_id, agent_id, MemoryType::Semantic, new_memory).await.is_ok() {
                    report.promoted += 1;
                    if self.episodic_promoter.should_archive_originals() {
                        for original in &cluster {
                            let mut archived = original.clone();
                            archived.status = MemoryStatus::Archived;
                            if let Err(err) = self.provider.update(&archived).await {
                                warn!(error = %err, memory_id = %original.id, "failed to archive promoted episodic memory");
                            }
                        }
                    }
                }
            }
        }

        if let Some(embedder) = &self.embedder {
            let semantic_filter = RecallFilter {
                memory_type: Some(MemoryType::Semantic),
                ..Default::default()
            };
            let semantic = self.provider.recall(user_id, agent_id, "*", &semantic_filter).await?;
            let mut embedded = Vec::with_capacity(semantic.len());
            for memory in semantic {
                if let Ok(embedding) = embedder.embed(&memory.content).await {
                    embedded.push((memory, embedding.vector));
                }
            }
            let clusters = self.merge_planner.plan_merges(&embedded);
            for cluster in clusters {
                if let Some(merged) = self.merge_planner.merge_cluster(&cluster) {
                    if self.provider.update(&merged).await.is_ok() {
                        for member in &cluster {
                            if member.id != merged.id {
                                let _ = self.provider.delete(user_id, agent_id, &member.id).await;
                            }
                        }
                        report.merged += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    pub async fn flush_lazy_decay_updates(&self) -> std::result::Result<(), BatchError> {
        self.batch_processor.flush_now().await
    }

    /// Cancel background tasks, flush and stop the decay batch processor,
    /// and release the provider's resources.
    pub async fn close(&self) -> Result<()> {
        self.consolidation_scheduler.stop().await;

        if let Some(handle) = self.discovery_drain_handle.lock().unwrap().take() {
            handle.abort();
        }

        let pending: Vec<_> = self.pending_temporal.lock().unwrap().drain(..).collect();
        for (cancel, handle) in pending {
            cancel.cancel();
            handle.abort();
        }

        if let Err(err) = self.batch_processor.destroy().await {
            warn!(failures = err.failed.len(), "decay batch flush on close had failures");
        }
        self.provider.destroy().await
    }
}
