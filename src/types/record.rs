//! Stored record shapes.
//!
//! Field names follow the document layout in `storage::fields`, so a record
//! serializes straight into the document the store keeps.

use super::{AgentId, KnowledgeId, MemoryId, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured payload of a memory or knowledge item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ContentMetadata>,

    /// Anything else the runtime attached (action, source, attachments, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: ContentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_chunk(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_chunk)
    }

    pub fn is_main(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_main)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(default)]
    pub is_main: bool,

    #[serde(default)]
    pub is_chunk: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<KnowledgeId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default)]
    pub is_shared: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_unique() -> bool {
    true
}

/// A memory: one message, fact or document fragment with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    #[serde(rename = "_id")]
    pub id: MemoryId,

    /// Table tag, stored as `type`
    #[serde(rename = "type")]
    pub table: String,

    pub user_id: UserId,
    pub agent_id: AgentId,
    pub room_id: RoomId,
    pub content: Content,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// Computed once at insert time
    #[serde(default = "default_unique")]
    pub unique: bool,

    /// Similarity to the query when returned from a search
    #[serde(skip)]
    pub similarity: Option<f32>,
}

impl Memory {
    pub fn new(
        table: impl Into<String>,
        user_id: UserId,
        agent_id: AgentId,
        room_id: RoomId,
        content: Content,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            table: table.into(),
            user_id,
            agent_id,
            room_id,
            content,
            embedding: None,
            created_at: Utc::now(),
            unique: true,
            similarity: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A knowledge document or one of its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeItem {
    #[serde(rename = "_id")]
    pub id: KnowledgeId,

    /// `None` for items shared with every agent
    #[serde(default)]
    pub agent_id: Option<AgentId>,

    pub content: Content,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub is_main: bool,

    #[serde(default)]
    pub original_id: Option<KnowledgeId>,

    #[serde(default)]
    pub chunk_index: Option<u32>,

    #[serde(default)]
    pub is_shared: bool,

    #[serde(skip)]
    pub similarity: Option<f32>,

    /// Similarity times keyword multiplier, set by knowledge search
    #[serde(skip)]
    pub score: Option<f32>,
}

impl KnowledgeItem {
    pub fn new(agent_id: Option<AgentId>, content: Content) -> Self {
        let is_shared = agent_id.is_none() || content.metadata.as_ref().is_some_and(|m| m.is_shared);
        let is_main = content.is_main();
        let original_id = content.metadata.as_ref().and_then(|m| m.original_id);
        let chunk_index = content.metadata.as_ref().and_then(|m| m.chunk_index);
        Self {
            id: KnowledgeId::new(),
            agent_id,
            content,
            embedding: None,
            created_at: Utc::now(),
            is_main,
            original_id,
            chunk_index,
            is_shared,
            similarity: None,
            score: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// One fuzzy match from the cached-embedding scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEmbedding {
    pub embedding: Vec<f32>,
    pub levenshtein_score: usize,
}
