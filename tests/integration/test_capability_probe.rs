//! Vector capability probing and request-time demotion through the facade.

use crate::common::{FlakyStore, in_memory, memory_with_id, test_settings};
use memdex::storage::DocumentStore;
use memdex::{
    AgentId, CapabilityState, DemotionPolicy, MemoryStore, RoomId, SearchMemoriesParams,
    StoreCapabilities,
};
use std::sync::atomic::Ordering;

async fn index_names(store: &impl DocumentStore, collection: &str) -> Vec<String> {
    store
        .list_indexes(collection)
        .await
        .unwrap()
        .into_iter()
        .map(|spec| spec.name)
        .collect()
}

#[tokio::test]
async fn test_no_vector_support_ends_disabled() {
    let store = in_memory(StoreCapabilities::default());
    let facade = MemoryStore::new(store.clone(), test_settings()).unwrap();

    assert_eq!(facade.init().await.unwrap(), CapabilityState::Disabled);
    assert_eq!(facade.capability(), CapabilityState::Disabled);
    assert_eq!(index_names(&store, "memories").await, vec!["embedding_1"]);
    assert_eq!(index_names(&store, "knowledge").await, vec!["embedding_1"]);
}

#[tokio::test]
async fn test_sharded_store_reverts_native_index() {
    let store = in_memory(StoreCapabilities {
        vector_search: true,
        sharded: true,
        sharded_vector_search: false,
    });
    let facade = MemoryStore::new(store.clone(), test_settings()).unwrap();

    assert_eq!(facade.init().await.unwrap(), CapabilityState::Disabled);
    for collection in ["memories", "knowledge"] {
        let names = index_names(&store, collection).await;
        assert!(!names.contains(&"vector_index".to_string()));
        assert!(names.contains(&"embedding_1".to_string()));
    }
}

#[tokio::test]
async fn test_native_support_ends_enabled_and_serves_searches() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::native()));
    let facade = MemoryStore::new(store, test_settings()).unwrap();
    assert_eq!(facade.init().await.unwrap(), CapabilityState::Enabled);

    let (agent, room) = (AgentId::new(), RoomId::new());
    facade
        .create_memory(memory_with_id(1, agent, room, "hi", vec![1.0, 0.0, 0.0]), false)
        .await
        .unwrap();

    let params = SearchMemoriesParams::new("messages", room, vec![1.0, 0.0, 0.0]);
    let results = facade.search(&params).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(facade.store().vector_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facade.store().find_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_native_failure_falls_back_for_that_request() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::native())).failing_vector_search();
    let facade = MemoryStore::new(store, test_settings()).unwrap();
    facade.init().await.unwrap();

    let (agent, room) = (AgentId::new(), RoomId::new());
    facade
        .create_memory(memory_with_id(1, agent, room, "hi", vec![1.0, 0.0, 0.0]), false)
        .await
        .unwrap();

    let params = SearchMemoriesParams::new("messages", room, vec![1.0, 0.0, 0.0]);
    for expected_native_calls in 1..=2 {
        let results = facade.search(&params).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].similarity.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(
            facade.store().vector_calls.load(Ordering::SeqCst),
            expected_native_calls
        );
    }
    assert_eq!(facade.capability(), CapabilityState::Enabled);
}

#[tokio::test]
async fn test_permanent_policy_stops_native_attempts() {
    let mut settings = test_settings();
    settings.search.demotion = DemotionPolicy::Permanent;
    let store = FlakyStore::new(in_memory(StoreCapabilities::native())).failing_vector_search();
    let facade = MemoryStore::new(store, settings).unwrap();
    facade.init().await.unwrap();

    let room = RoomId::new();
    facade
        .create_memory(memory_with_id(1, AgentId::new(), room, "hi", vec![0.0, 1.0, 0.0]), false)
        .await
        .unwrap();

    let params = SearchMemoriesParams::new("messages", room, vec![0.0, 1.0, 0.0]);
    facade.search(&params).await.unwrap();
    assert_eq!(facade.capability(), CapabilityState::Disabled);

    let results = facade.search(&params).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(facade.store().vector_calls.load(Ordering::SeqCst), 1);
}
