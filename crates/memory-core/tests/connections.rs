//! Cross-module connection discovery: storing memories through the façade
//! with vector ops enabled, and checking the discovered `MemoryConnection`s
//! that land in the provider, rather than `ConnectionManager::discover` in
//! isolation.

use std::sync::Arc;

use agent_memory_core::testing::{FakeEmbedder, InMemoryProvider, ScriptedChat};
use agent_memory_core::{ConnectionType, Embedder, MemoryConfig, MemoryManager, MemoryType, NewMemory};

fn manager_with_embedder(provider: Arc<InMemoryProvider>) -> Arc<MemoryManager> {
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::default());
    MemoryManager::new(provider, Some(embedder), None, MemoryConfig::default()).unwrap()
}

#[tokio::test]
async fn near_identical_content_is_auto_connected_as_similar() {
    let provider = Arc::new(InMemoryProvider::new());
    let manager = manager_with_embedder(Arc::clone(&provider));

    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "the api key rotates every thirty days".into(), importance: 0.7, ..Default::default() },
        )
        .await
        .unwrap();
    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "the api key rotates every thirty days".into(), importance: 0.7, ..Default::default() },
        )
        .await
        .unwrap();

    let connections = provider.connections_snapshot();
    assert!(
        connections.iter().any(|c| c.connection_type == ConnectionType::Similar),
        "identical content embedded through the same fake embedder should land in the auto-similar band"
    );
}

#[tokio::test]
async fn unrelated_content_produces_no_connection() {
    let provider = Arc::new(InMemoryProvider::new());
    let manager = manager_with_embedder(Arc::clone(&provider));

    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "rust ownership prevents data races".into(), importance: 0.7, ..Default::default() },
        )
        .await
        .unwrap();
    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "the weather in lisbon is mild in october".into(), importance: 0.7, ..Default::default() },
        )
        .await
        .unwrap();

    assert!(provider.connections_snapshot().is_empty());
}

#[tokio::test]
async fn ambiguous_band_without_chat_drops_the_candidate() {
    // Two contents close enough to land in the ambiguous band but not the
    // auto-similar/auto-related bands, with no chat capability configured.
    let provider = Arc::new(InMemoryProvider::new());
    let manager = manager_with_embedder(Arc::clone(&provider));

    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "x".into(), importance: 0.5, ..Default::default() },
        )
        .await
        .unwrap();
    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "y".into(), importance: 0.5, ..Default::default() },
        )
        .await
        .unwrap();

    // No assertion on band placement itself (covered by connections::manager
    // unit tests); this only checks the façade never panics or surfaces an
    // error to the caller when discovery silently drops a candidate.
    assert!(provider.memory_count() == 2);
}

#[tokio::test]
async fn ambiguous_band_with_chat_uses_llm_classification() {
    let provider = Arc::new(InMemoryProvider::new());
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::default());
    let chat: Arc<dyn agent_memory_core::Chat> = Arc::new(ScriptedChat::new(vec![serde_json::json!({
        "relationship": "related"
    })]));
    let manager = MemoryManager::new(Arc::clone(&provider), Some(embedder), Some(chat), MemoryConfig::default()).unwrap();

    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "deploying the service requires a staging rollout first".into(), importance: 0.6, ..Default::default() },
        )
        .await
        .unwrap();
    manager
        .store(
            "u",
            "a",
            MemoryType::Semantic,
            NewMemory { content: "rollback plans should be rehearsed before a production deploy".into(), importance: 0.6, ..Default::default() },
        )
        .await
        .unwrap();

    // Either the embedding similarity lands in an auto band or the scripted
    // "related" response is used; either way no panic and the provider
    // stays consistent.
    assert_eq!(provider.memory_count(), 2);
}

#[tokio::test]
async fn manual_connection_bypasses_similarity_cascade() {
    let provider = Arc::new(InMemoryProvider::new());
    let manager = manager_with_embedder(Arc::clone(&provider));

    let a = manager
        .store("u", "a", MemoryType::Semantic, NewMemory { content: "fact a".into(), importance: 0.5, ..Default::default() })
        .await
        .unwrap();
    let b = manager
        .store("u", "a", MemoryType::Semantic, NewMemory { content: "fact b".into(), importance: 0.5, ..Default::default() })
        .await
        .unwrap();

    let connection = manager
        .create_connection(&a.id, &b.id, ConnectionType::Causes, 0.9, Some("manually linked".into()))
        .await
        .unwrap();
    assert_eq!(connection.connection_type, ConnectionType::Causes);
    assert!(provider.connections_snapshot().iter().any(|c| c.id == connection.id));
}
