//! Cross-module recall scenarios: `MemoryManager::recall`/`search_knowledge`
//! driving hybrid search fusion and ranking end to end, rather than
//! `HybridSearch`/`fusion` in isolation.

use std::sync::Arc;

use agent_memory_core::testing::{FakeEmbedder, InMemoryProvider};
use agent_memory_core::{Embedder, MemoryConfig, MemoryManager, MemoryType, NewMemory, RecallFilter};

fn manager(provider: Arc<InMemoryProvider>, embedder: Option<Arc<dyn Embedder>>) -> Arc<MemoryManager> {
    MemoryManager::new(provider, embedder, None, MemoryConfig::default()).unwrap()
}

#[tokio::test]
async fn recall_ranks_lexically_relevant_memory_first() {
    let provider = Arc::new(InMemoryProvider::new());
    let manager = manager(Arc::clone(&provider), None);

    let relevant = manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "rust ownership and borrowing prevents data races".into(), importance: 0.8, ..Default::default() },
        )
        .await
        .unwrap();
    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "unrelated content about gardening in spring".into(), importance: 0.8, ..Default::default() },
        )
        .await
        .unwrap();

    let weights = manager.config().recall_presets.precision;
    let results = manager
        .recall("u", "a", "rust ownership data races", &weights, &RecallFilter::default())
        .await
        .unwrap();
    assert_eq!(results[0].memory.id, relevant.id);
}

#[tokio::test]
async fn recall_is_scoped_to_user_and_agent() {
    let provider = Arc::new(InMemoryProvider::new());
    let manager = manager(Arc::clone(&provider), None);

    manager
        .store("u1", "a", MemoryType::Semantic, NewMemory { content: "tenant one's fact".into(), importance: 0.8, ..Default::default() })
        .await
        .unwrap();
    manager
        .store("u2", "a", MemoryType::Semantic, NewMemory { content: "tenant two's fact".into(), importance: 0.8, ..Default::default() })
        .await
        .unwrap();

    let weights = manager.config().recall_presets.default;
    let results = manager.recall("u1", "a", "fact", &weights, &RecallFilter::default()).await.unwrap();
    assert!(results.iter().all(|r| r.memory.user_id == "u1"));
}

#[tokio::test]
async fn search_knowledge_combines_semantic_and_procedural_only() {
    let provider = Arc::new(InMemoryProvider::new());
    let manager = manager(Arc::clone(&provider), None);

    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "rust has no garbage collector".into(), importance: 0.8, ..Default::default() },
        )
        .await
        .unwrap();
    manager
        .store(
            "u",
            "a",
            MemoryType::Procedural,
            NewMemory { content: "how to build a rust workspace crate by crate".into(), importance: 0.8, ..Default::default() },
        )
        .await
        .unwrap();
    manager
        .store(
            "u",
            "a",
            MemoryType::Working,
            NewMemory { content: "rust session scratch note".into(), session_id: Some("s1".into()), importance: 0.8, ..Default::default() },
        )
        .await
        .unwrap();

    let weights = manager.config().recall_presets.default;
    let results = manager.search_knowledge("u", "a", "rust", &weights).await.unwrap();
    assert!(results.iter().all(|r| r.memory.memory_type != MemoryType::Working));
    assert!(results.len() >= 2);
}

#[tokio::test]
async fn vector_and_text_candidates_merge_into_one_ranked_result_set() {
    let provider = Arc::new(InMemoryProvider::new());
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::default());
    let manager = manager(Arc::clone(&provider), Some(Arc::clone(&embedder)));

    let memory = manager
        .store_with_transaction(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "embedded content lexically distinct from the query".into(), importance: 0.7, ..Default::default() },
        )
        .await
        .unwrap();

    let weights = manager.config().recall_presets.research;
    let results = manager
        .recall("u", "a", &memory.content, &weights, &RecallFilter::default())
        .await
        .unwrap();
    assert!(results.iter().any(|r| r.memory.id == memory.id));
}

#[tokio::test]
async fn get_recommendations_requires_vector_ops() {
    use agent_memory_core::MemoryError;

    struct NoVectorOpsProvider(InMemoryProvider);

    #[async_trait::async_trait]
    impl agent_memory_core::StorageProvider for NoVectorOpsProvider {
        async fn store(&self, memory: &agent_memory_core::Memory) -> agent_memory_core::Result<String> {
            self.0.store(memory).await
        }
        async fn get_by_id(&self, user_id: &str, agent_id: &str, memory_id: &str) -> agent_memory_core::Result<Option<agent_memory_core::Memory>> {
            self.0.get_by_id(user_id, agent_id, memory_id).await
        }
        async fn recall(
            &self,
            user_id: &str,
            agent_id: &str,
            query: &str,
            filter: &RecallFilter,
        ) -> agent_memory_core::Result<Vec<agent_memory_core::Memory>> {
            self.0.recall(user_id, agent_id, query, filter).await
        }
        async fn update(&self, memory: &agent_memory_core::Memory) -> agent_memory_core::Result<()> {
            self.0.update(memory).await
        }
        async fn delete(&self, user_id: &str, agent_id: &str, memory_id: &str) -> agent_memory_core::Result<()> {
            self.0.delete(user_id, agent_id, memory_id).await
        }
        async fn get_stats(
            &self,
            user_id: &str,
            agent_id: &str,
            memory_type: MemoryType,
        ) -> agent_memory_core::Result<agent_memory_core::MemoryStats> {
            self.0.get_stats(user_id, agent_id, memory_type).await
        }
    }

    let provider = Arc::new(NoVectorOpsProvider(InMemoryProvider::new()));
    let manager = MemoryManager::new(provider, None, None, MemoryConfig::default()).unwrap();
    let err = manager.get_recommendations("u", "missing", 5).await.unwrap_err();
    assert!(matches!(err, MemoryError::NotSupported { .. }));
}
