use crate::common::{at_second, in_memory, memory_with_id, test_settings};
use memdex::storage::DocumentStore;
use memdex::{
    AgentId, Content, GetKnowledgeParams, GetMemoriesParams, KnowledgeItem, MemoryId,
    MemoryStore, RoomId, StoreCapabilities,
};
use serde_json::json;

#[tokio::test]
async fn test_get_memories_newest_first_with_window() {
    let facade = MemoryStore::new(in_memory(StoreCapabilities::default()), test_settings()).unwrap();
    let (agent, room) = (AgentId::new(), RoomId::new());
    for n in 0..5 {
        let mut memory = memory_with_id(n + 1, agent, room, &format!("m{n}"), vec![1.0, 0.0, 0.0]);
        memory.created_at = at_second(n as i64 * 10);
        facade.create_memory(memory, false).await.unwrap();
    }

    let all = facade
        .get_memories(&GetMemoriesParams::new("messages", room))
        .await
        .unwrap();
    let texts: Vec<&str> = all.iter().map(|m| m.content.text.as_str()).collect();
    assert_eq!(texts, vec!["m4", "m3", "m2", "m1", "m0"]);

    let window = facade
        .get_memories(&GetMemoriesParams::new("messages", room).between(at_second(10), at_second(30)).count(2))
        .await
        .unwrap();
    let texts: Vec<&str> = window.iter().map(|m| m.content.text.as_str()).collect();
    assert_eq!(texts, vec!["m3", "m2"]);

    let none = facade
        .get_memories(&GetMemoriesParams::new("messages", room).agent(AgentId::new()))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_legacy_timestamps_join_window_and_order() {
    let store = in_memory(StoreCapabilities::default());
    let facade = MemoryStore::new(store.clone(), test_settings()).unwrap();
    let (agent, room) = (AgentId::new(), RoomId::new());
    for (n, secs) in [(1, 0), (2, 40)] {
        let mut memory = memory_with_id(n, agent, room, &format!("t{secs}"), vec![1.0, 0.0, 0.0]);
        memory.created_at = at_second(secs);
        facade.create_memory(memory, false).await.unwrap();
    }
    // 1_700_000_020 and 1_700_000_030 seconds, written by older clients
    for (created_at, text) in [
        (json!("2023-11-14T22:13:40Z"), "t20"),
        (json!({ "$date": 1_700_000_030_000_i64 }), "t30"),
    ] {
        let legacy = json!({
            "_id": MemoryId::new().to_string(),
            "type": "messages",
            "userId": memdex::UserId::new().to_string(),
            "agentId": agent.to_string(),
            "roomId": room.to_string(),
            "content": { "text": text },
            "createdAt": created_at,
        });
        store
            .insert("memories", legacy.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    let all = facade
        .get_memories(&GetMemoriesParams::new("messages", room))
        .await
        .unwrap();
    let texts: Vec<&str> = all.iter().map(|m| m.content.text.as_str()).collect();
    assert_eq!(texts, vec!["t40", "t30", "t20", "t0"]);

    let window = facade
        .get_memories(&GetMemoriesParams::new("messages", room).between(at_second(10), at_second(35)))
        .await
        .unwrap();
    let texts: Vec<&str> = window.iter().map(|m| m.content.text.as_str()).collect();
    assert_eq!(texts, vec!["t30", "t20"]);
}

#[tokio::test]
async fn test_remove_single_and_all() {
    let facade = MemoryStore::new(in_memory(StoreCapabilities::default()), test_settings()).unwrap();
    let (agent, room) = (AgentId::new(), RoomId::new());
    let first = facade
        .create_memory(memory_with_id(1, agent, room, "one", vec![1.0, 0.0, 0.0]), false)
        .await
        .unwrap();
    for n in 2..=4 {
        facade
            .create_memory(memory_with_id(n, agent, room, "more", vec![1.0, 0.0, 0.0]), false)
            .await
            .unwrap();
    }

    assert!(!facade.remove_memory(first.id, "facts").await.unwrap());
    assert!(facade.remove_memory(first.id, "messages").await.unwrap());
    assert!(facade.get_memory_by_id(first.id).await.unwrap().is_none());
    assert_eq!(facade.remove_all_memories(room, "messages").await.unwrap(), 3);
    assert_eq!(facade.count_memories(room, "messages", false).await.unwrap(), 0);
}

#[tokio::test]
async fn test_legacy_documents_are_normalized_on_read() {
    let store = in_memory(StoreCapabilities::default());
    let facade = MemoryStore::new(store.clone(), test_settings()).unwrap();
    let id = MemoryId::new();
    let room = RoomId::new();
    let legacy = json!({
        "_id": id.to_string(),
        "type": "messages",
        "userId": memdex::UserId::new().to_string(),
        "agentId": AgentId::new().to_string(),
        "roomId": room.to_string(),
        "content": "{\"text\":\"from an older writer\",\"source\":\"discord\"}",
        "createdAt": "2024-03-01T12:00:00Z",
        "embedding": [0.0, 1.0, 0.0]
    });
    store
        .insert("memories", legacy.as_object().cloned().unwrap())
        .await
        .unwrap();

    let memory = facade.get_memory_by_id(id).await.unwrap().unwrap();
    assert_eq!(memory.content.text, "from an older writer");
    assert_eq!(memory.content.extra["source"], "discord");
    assert_eq!(memory.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    assert!(memory.unique);

    // Legacy records take part in searches too
    let hits = facade
        .search(&memdex::SearchMemoriesParams::new("messages", room, vec![0.0, 1.0, 0.0]))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_knowledge_listing_respects_sharing() {
    let facade = MemoryStore::new(in_memory(StoreCapabilities::default()), test_settings()).unwrap();
    let (agent, stranger) = (AgentId::new(), AgentId::new());
    facade
        .create_knowledge(KnowledgeItem::new(Some(agent), Content::text("mine")))
        .await
        .unwrap();
    facade
        .create_knowledge(KnowledgeItem::new(None, Content::text("shared")))
        .await
        .unwrap();
    let theirs = facade
        .create_knowledge(KnowledgeItem::new(Some(stranger), Content::text("theirs")))
        .await
        .unwrap();

    let visible = facade
        .get_knowledge(&GetKnowledgeParams {
            agent_id: Some(agent),
            ..GetKnowledgeParams::default()
        })
        .await
        .unwrap();
    let mut texts: Vec<String> = visible.into_iter().map(|k| k.content.text).collect();
    texts.sort();
    assert_eq!(texts, vec!["mine", "shared"]);

    let by_id = facade
        .get_knowledge(&GetKnowledgeParams {
            id: Some(theirs.id),
            ..GetKnowledgeParams::default()
        })
        .await
        .unwrap();
    assert_eq!(by_id.len(), 1);

    assert_eq!(facade.clear_knowledge(agent, false).await.unwrap(), 1);
    assert_eq!(facade.clear_knowledge(stranger, true).await.unwrap(), 2);
}

#[tokio::test]
async fn test_closed_store_reports_store_errors() {
    let facade = MemoryStore::new(in_memory(StoreCapabilities::default()), test_settings()).unwrap();
    facade.close().await.unwrap();
    let err = facade
        .count_memories(RoomId::new(), "messages", false)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), "STORE_ERROR");
    assert!(err.to_string().contains("count_memories"));
}
