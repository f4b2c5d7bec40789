use crate::common::{FlakyStore, SeenVectorRequest, in_memory, memory_with_id, test_settings};
use memdex::{
    AgentId, Content, InMemoryStore, KnowledgeItem, MemoryError, MemoryStore, RoomId,
    SearchByEmbeddingParams, SearchKnowledgeParams, SearchMemoriesParams, StoreCapabilities,
    ValidationError,
};

async fn seeded_facade(
    capabilities: StoreCapabilities,
) -> (MemoryStore<InMemoryStore>, AgentId, RoomId) {
    let facade = MemoryStore::new(in_memory(capabilities), test_settings()).unwrap();
    facade.init().await.unwrap();
    let (agent, room) = (AgentId::new(), RoomId::new());
    for (n, text, embedding) in [
        (1, "same", vec![1.0, 0.0, 0.0]),
        (2, "orthogonal", vec![0.0, 1.0, 0.0]),
        (3, "opposite", vec![-1.0, 0.0, 0.0]),
    ] {
        facade
            .create_memory(memory_with_id(n, agent, room, text, embedding), false)
            .await
            .unwrap();
    }
    (facade, agent, room)
}

#[tokio::test]
async fn test_threshold_keeps_only_close_records_on_both_paths() {
    for capabilities in [StoreCapabilities::default(), StoreCapabilities::native()] {
        let (facade, _, room) = seeded_facade(capabilities).await;
        let params = SearchMemoriesParams::new("messages", room, vec![1.0, 0.0, 0.0])
            .threshold(0.5)
            .count(10);

        let results = facade.search(&params).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|m| m.content.text.as_str()).collect();
        assert_eq!(texts, vec!["same"], "capabilities {capabilities:?}");
    }
}

#[tokio::test]
async fn test_native_and_fallback_rank_identically() {
    let (native, _, native_room) = seeded_facade(StoreCapabilities::native()).await;
    let (fallback, _, fallback_room) = seeded_facade(StoreCapabilities::default()).await;
    let query = vec![0.6, 0.8, 0.0];

    let rank = |results: Vec<memdex::Memory>| -> Vec<String> {
        results.into_iter().map(|m| m.content.text).collect()
    };
    let a = native
        .search(&SearchMemoriesParams::new("messages", native_room, query.clone()).threshold(-1.0))
        .await
        .unwrap();
    let b = fallback
        .search(&SearchMemoriesParams::new("messages", fallback_room, query).threshold(-1.0))
        .await
        .unwrap();
    assert_eq!(rank(a), vec!["orthogonal", "same", "opposite"]);
    assert_eq!(rank(b), vec!["orthogonal", "same", "opposite"]);
}

#[tokio::test]
async fn test_owner_and_room_scoping() {
    let (facade, agent, room) = seeded_facade(StoreCapabilities::default()).await;
    let stranger = AgentId::new();
    let other_room = RoomId::new();
    facade
        .create_memory(memory_with_id(10, stranger, room, "stranger", vec![1.0, 0.0, 0.0]), false)
        .await
        .unwrap();
    facade
        .create_memory(memory_with_id(11, agent, other_room, "elsewhere", vec![1.0, 0.0, 0.0]), false)
        .await
        .unwrap();

    let everywhere = facade
        .search_by_embedding(&[1.0, 0.0, 0.0], &SearchByEmbeddingParams::new("messages", agent).threshold(0.9))
        .await
        .unwrap();
    let mut texts: Vec<String> = everywhere.into_iter().map(|m| m.content.text).collect();
    texts.sort();
    assert_eq!(texts, vec!["elsewhere", "same"]);

    let in_room = facade
        .search_by_embedding(
            &[1.0, 0.0, 0.0],
            &SearchByEmbeddingParams::new("messages", agent).room(room).threshold(0.9),
        )
        .await
        .unwrap();
    assert_eq!(in_room.len(), 1);
    assert_eq!(in_room[0].content.text, "same");

    let whole_room = facade
        .search(&SearchMemoriesParams::new("messages", room, vec![1.0, 0.0, 0.0]).threshold(0.9))
        .await
        .unwrap();
    assert_eq!(whole_room.len(), 2);
}

#[tokio::test]
async fn test_unique_only_hides_near_duplicates() {
    let facade = MemoryStore::new(in_memory(StoreCapabilities::default()), test_settings()).unwrap();
    let (agent, room) = (AgentId::new(), RoomId::new());
    for (n, embedding) in [(1, vec![0.0, 0.0, 1.0]), (2, vec![0.0, 0.01, 1.0])] {
        facade
            .create_memory(memory_with_id(n, agent, room, "note", embedding), true)
            .await
            .unwrap();
    }

    let query = vec![0.0, 0.0, 1.0];
    let all = facade
        .search(&SearchMemoriesParams::new("messages", room, query.clone()))
        .await
        .unwrap();
    let unique = facade
        .search(&SearchMemoriesParams::new("messages", room, query).unique(true))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(unique.len(), 1);
    assert!(unique[0].unique);
}

#[tokio::test]
async fn test_count_limits_results_best_first() {
    let (facade, _, room) = seeded_facade(StoreCapabilities::default()).await;
    let results = facade
        .search(&SearchMemoriesParams::new("messages", room, vec![1.0, 0.2, 0.0]).threshold(-1.0).count(2))
        .await
        .unwrap();
    let sims: Vec<f32> = results.iter().map(|m| m.similarity.unwrap()).collect();
    assert_eq!(sims.len(), 2);
    assert!(sims[0] >= sims[1]);
    assert_eq!(results[0].content.text, "same");
}

#[tokio::test]
async fn test_bad_embedding_is_validation_error() {
    let (facade, _, room) = seeded_facade(StoreCapabilities::default()).await;

    let err = facade
        .search(&SearchMemoriesParams::new("messages", room, vec![1.0, 0.0]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), "VALIDATION_ERROR");
    assert!(!err.is_retryable());

    let err = facade
        .search(&SearchMemoriesParams::new("messages", room, Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Search(memdex::SearchError::Validation(ValidationError::EmptyEmbedding))
    ));
}

#[tokio::test]
async fn test_knowledge_keyword_boost_and_sharing() {
    let facade = MemoryStore::new(in_memory(StoreCapabilities::default()), test_settings()).unwrap();
    let (agent, stranger) = (AgentId::new(), AgentId::new());
    let items = [
        KnowledgeItem::new(Some(agent), Content::text("Ownership basics"))
            .with_embedding(vec![1.0, 0.0, 0.0]),
        KnowledgeItem::new(None, Content::text("Scheduling with the Tokio runtime"))
            .with_embedding(vec![0.5, 0.866_025_4, 0.0]),
        KnowledgeItem::new(None, Content::text("Unrelated shared note"))
            .with_embedding(vec![0.5, 0.866_025_4, 0.0]),
        KnowledgeItem::new(Some(stranger), Content::text("Tokio internals, private"))
            .with_embedding(vec![1.0, 0.0, 0.0]),
    ];
    for item in items {
        facade.create_knowledge(item).await.unwrap();
    }

    let params = SearchKnowledgeParams::new(agent, vec![1.0, 0.0, 0.0])
        .threshold(0.9)
        .count(5)
        .text("tokio");
    let results = facade.search_knowledge(&params).await.unwrap();

    let texts: Vec<&str> = results.iter().map(|k| k.content.text.as_str()).collect();
    assert_eq!(texts, vec!["Scheduling with the Tokio runtime", "Ownership basics"]);
    assert!((results[0].score.unwrap() - 1.5).abs() < 1e-3);
    assert!((results[0].similarity.unwrap() - 0.5).abs() < 1e-3);
    assert!((results[1].score.unwrap() - 1.0).abs() < 1e-3);
}

#[tokio::test]
async fn test_knowledge_search_on_native_index_widens_pool() {
    let store = FlakyStore::new(in_memory(StoreCapabilities::native()));
    let facade = MemoryStore::new(store, test_settings()).unwrap();
    assert_eq!(facade.init().await.unwrap(), memdex::CapabilityState::Enabled);
    let agent = AgentId::new();
    let items = [
        KnowledgeItem::new(Some(agent), Content::text("Ownership basics"))
            .with_embedding(vec![1.0, 0.0, 0.0]),
        KnowledgeItem::new(None, Content::text("Scheduling with the Tokio runtime"))
            .with_embedding(vec![0.5, 0.866_025_4, 0.0]),
        KnowledgeItem::new(None, Content::text("Unrelated shared note"))
            .with_embedding(vec![0.5, 0.866_025_4, 0.0]),
        KnowledgeItem::new(Some(agent), Content::text("Far away"))
            .with_embedding(vec![0.0, 0.0, 1.0]),
    ];
    for item in items {
        facade.create_knowledge(item).await.unwrap();
    }

    let params = SearchKnowledgeParams::new(agent, vec![1.0, 0.0, 0.0])
        .threshold(0.9)
        .count(2)
        .text("tokio");
    let results = facade.search_knowledge(&params).await.unwrap();

    let texts: Vec<&str> = results.iter().map(|k| k.content.text.as_str()).collect();
    assert_eq!(texts, vec!["Scheduling with the Tokio runtime", "Ownership basics"]);
    // count 2, widened by the multiplier of 2, then doubled again for the candidate pool
    let seen = facade.store().vector_requests.lock().clone();
    assert_eq!(
        seen,
        vec![SeenVectorRequest {
            collection: "knowledge".to_string(),
            num_candidates: 8,
            limit: 4,
        }]
    );
    assert_eq!(facade.store().find_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fallback_ranks_only_capped_candidates() {
    let mut settings = test_settings();
    settings.search.fallback_candidate_cap = 3;
    let facade = MemoryStore::new(in_memory(StoreCapabilities::default()), settings).unwrap();
    let (agent, room) = (AgentId::new(), RoomId::new());
    for (n, text, embedding) in [
        (1, "one", vec![0.0, 1.0, 0.0]),
        (2, "two", vec![0.6, 0.8, 0.0]),
        (3, "three", vec![-1.0, 0.0, 0.0]),
        (4, "four", vec![0.8, 0.6, 0.0]),
        (5, "five", vec![1.0, 0.0, 0.0]),
    ] {
        facade
            .create_memory(memory_with_id(n, agent, room, text, embedding), false)
            .await
            .unwrap();
    }

    // Only the three lowest ids are loaded, so the exact match (#5) is out of reach
    let params = SearchMemoriesParams::new("messages", room, vec![1.0, 0.0, 0.0])
        .threshold(-1.0)
        .count(5);
    for _ in 0..2 {
        let results = facade.search(&params).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|m| m.content.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "one", "three"]);
    }
}
