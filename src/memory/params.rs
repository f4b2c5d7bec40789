//! Request parameters for the `MemoryStore` operations.
//!
//! `None` for a threshold or count means "use the configured default".

use chrono::{DateTime, Utc};

use crate::types::{AgentId, KnowledgeId, RoomId};

/// Similarity search scoped to one room.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMemoriesParams {
    pub table: String,
    pub room_id: RoomId,
    pub agent_id: Option<AgentId>,
    pub embedding: Vec<f32>,
    pub match_threshold: Option<f32>,
    pub count: Option<usize>,
    pub unique: bool,
}

impl SearchMemoriesParams {
    pub fn new(table: impl Into<String>, room_id: RoomId, embedding: Vec<f32>) -> Self {
        Self {
            table: table.into(),
            room_id,
            agent_id: None,
            embedding,
            match_threshold: None,
            count: None,
            unique: false,
        }
    }

    pub fn agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = Some(threshold);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// Similarity search owned by one agent, optionally narrowed to a room.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchByEmbeddingParams {
    pub table: String,
    pub agent_id: AgentId,
    pub room_id: Option<RoomId>,
    pub match_threshold: Option<f32>,
    pub count: Option<usize>,
    pub unique: bool,
}

impl SearchByEmbeddingParams {
    pub fn new(table: impl Into<String>, agent_id: AgentId) -> Self {
        Self {
            table: table.into(),
            agent_id,
            room_id: None,
            match_threshold: None,
            count: None,
            unique: false,
        }
    }

    pub fn room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = Some(threshold);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// Fuzzy lookup of cached embeddings by a text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEmbeddingsQuery {
    pub table: String,
    pub input: String,
    /// Dotted path of the compared field, e.g. `content.text`
    pub field_path: String,
    /// Largest edit distance still reported
    pub max_distance: usize,
    pub match_count: usize,
}

impl CachedEmbeddingsQuery {
    pub fn new(table: impl Into<String>, input: impl Into<String>, match_count: usize) -> Self {
        Self {
            table: table.into(),
            input: input.into(),
            field_path: "content.text".to_string(),
            max_distance: usize::MAX,
            match_count,
        }
    }

    pub fn field(mut self, path: impl Into<String>) -> Self {
        self.field_path = path.into();
        self
    }

    pub fn max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = max_distance;
        self
    }
}

/// Plain listing of a room's memories, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMemoriesParams {
    pub table: String,
    pub room_id: RoomId,
    pub agent_id: Option<AgentId>,
    pub count: Option<usize>,
    pub unique: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl GetMemoriesParams {
    pub fn new(table: impl Into<String>, room_id: RoomId) -> Self {
        Self {
            table: table.into(),
            room_id,
            agent_id: None,
            count: None,
            unique: false,
            start: None,
            end: None,
        }
    }

    pub fn agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Only memories created within `[start, end]`
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetKnowledgeParams {
    pub id: Option<KnowledgeId>,
    /// Restrict to this agent's items plus shared ones
    pub agent_id: Option<AgentId>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchKnowledgeParams {
    pub agent_id: AgentId,
    pub embedding: Vec<f32>,
    pub match_threshold: Option<f32>,
    pub match_count: Option<usize>,
    /// Free text for the keyword boost
    pub search_text: Option<String>,
}

impl SearchKnowledgeParams {
    pub fn new(agent_id: AgentId, embedding: Vec<f32>) -> Self {
        Self {
            agent_id,
            embedding,
            match_threshold: None,
            match_count: None,
            search_text: None,
        }
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = Some(threshold);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.match_count = Some(count);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }
}
