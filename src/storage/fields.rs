//! Document field names shared by every backend

use std::fmt;

/// Strongly-typed document fields to avoid string literals in queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    /// Table tag of a memory ("messages", "facts", ...)
    Table,
    Content,
    ContentText,
    Embedding,
    UserId,
    AgentId,
    RoomId,
    CreatedAt,
    Unique,
    IsMain,
    IsShared,
    OriginalId,
    ChunkIndex,
}

impl Field {
    /// Get the dotted path used in stored documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::Table => "type",
            Self::Content => "content",
            Self::ContentText => "content.text",
            Self::Embedding => "embedding",
            Self::UserId => "userId",
            Self::AgentId => "agentId",
            Self::RoomId => "roomId",
            Self::CreatedAt => "createdAt",
            Self::Unique => "unique",
            Self::IsMain => "isMain",
            Self::IsShared => "isShared",
            Self::OriginalId => "originalId",
            Self::ChunkIndex => "chunkIndex",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.as_str().to_string()
    }
}

/// Collection holding memories of every table.
pub const MEMORIES: &str = "memories";

/// Collection holding knowledge items and their chunks.
pub const KNOWLEDGE: &str = "knowledge";
