//! Fuzzy cached-embedding lookup: ranking, partial scans and cancellation.

use crate::common::{FlakyStore, in_memory, memory_with_id, test_settings};
use memdex::{
    AgentId, CachedEmbeddingsQuery, Content, InMemoryStore, Memory, MemoryError, MemoryStore,
    RoomId, StoreCapabilities, UserId,
};
use tokio_util::sync::CancellationToken;

async fn facade_with(
    store: FlakyStore<InMemoryStore>,
    batch_size: usize,
    texts: &[&str],
) -> MemoryStore<FlakyStore<InMemoryStore>> {
    let mut settings = test_settings();
    settings.fuzzy.batch_size = batch_size;
    let facade = MemoryStore::new(store, settings).unwrap();
    let (agent, room) = (AgentId::new(), RoomId::new());
    for (i, text) in texts.iter().enumerate() {
        let n = i as u128 + 1;
        let embedding = vec![n as f32, 0.0, 1.0];
        facade
            .create_memory(memory_with_id(n, agent, room, text, embedding), false)
            .await
            .unwrap();
    }
    facade
}

#[tokio::test]
async fn test_ranks_closest_texts_first() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::default()));
    let facade = facade_with(store, 1000, &["goodbye", "hallo", "hello"]).await;

    let results = facade
        .get_cached_embeddings(&CachedEmbeddingsQuery::new("messages", "hello", 2))
        .await
        .unwrap();

    let scores: Vec<usize> = results.iter().map(|r| r.levenshtein_score).collect();
    assert_eq!(scores, vec![0, 1]);
    // Embeddings identify the source records: "hello" is #3, "hallo" is #2
    assert_eq!(results[0].embedding, vec![3.0, 0.0, 1.0]);
    assert_eq!(results[1].embedding, vec![2.0, 0.0, 1.0]);
}

#[tokio::test]
async fn test_failure_on_second_page_keeps_first_page() {
    // Pages of two in id order: [alpha, alphx] [alpha, beta] [gamma, delta]
    let store = FlakyStore::new(in_memory(StoreCapabilities::default())).failing_find(2);
    let facade = facade_with(
        store,
        2,
        &["alpha", "alphx", "alpha", "beta", "gamma", "delta"],
    )
    .await;

    let results = facade
        .get_cached_embeddings(&CachedEmbeddingsQuery::new("messages", "alpha", 3))
        .await
        .unwrap();

    let ranked: Vec<(f32, usize)> = results
        .iter()
        .map(|r| (r.embedding[0], r.levenshtein_score))
        .collect();
    assert_eq!(ranked, vec![(1.0, 0), (2.0, 1)]);
}

#[tokio::test]
async fn test_failure_before_any_result_is_an_error() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::default())).failing_find(1);
    let facade = facade_with(store, 2, &["alpha", "beta", "gamma"]).await;

    let err = facade
        .get_cached_embeddings(&CachedEmbeddingsQuery::new("messages", "alpha", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::ScanFailed { ref table, .. } if table == "messages"));
    assert_eq!(err.status_code(), "SCAN_FAILED");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_max_distance_and_unscoreable_records() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::default()));
    let facade = facade_with(store, 2, &["hello", "help", "world"]).await;
    // Same table and text but no embedding: never returned
    let bare = Memory::new(
        "messages",
        UserId::new(),
        AgentId::new(),
        RoomId::new(),
        Content::text("hello"),
    );
    facade.create_memory(bare, false).await.unwrap();

    let query = CachedEmbeddingsQuery::new("messages", "HELLO", 10).max_distance(2);
    let results = facade.get_cached_embeddings(&query).await.unwrap();
    let scores: Vec<usize> = results.iter().map(|r| r.levenshtein_score).collect();
    assert_eq!(scores, vec![0, 2]);
}

#[tokio::test]
async fn test_other_tables_are_ignored() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::default()));
    let facade = facade_with(store, 10, &["hello"]).await;
    let mut fact = memory_with_id(99, AgentId::new(), RoomId::new(), "hello", vec![9.0, 0.0, 1.0]);
    fact.table = "facts".to_string();
    facade.create_memory(fact, false).await.unwrap();

    let results = facade
        .get_cached_embeddings(&CachedEmbeddingsQuery::new("facts", "hello", 5))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].embedding, vec![9.0, 0.0, 1.0]);
}

#[tokio::test]
async fn test_cancelled_scan_returns_empty() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::default()));
    let facade = facade_with(store, 1, &["a", "b", "c"]).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = facade
        .get_cached_embeddings_with_cancel(&CachedEmbeddingsQuery::new("messages", "a", 2), &cancel)
        .await
        .unwrap();
    assert!(results.is_empty());
}
