mod record;

pub use record::{CachedEmbedding, Content, ContentMetadata, KnowledgeItem, Memory};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a stored memory
    MemoryId
);
uuid_id!(
    /// Identifier of a knowledge item or chunk
    KnowledgeId
);
uuid_id!(UserId);
uuid_id!(AgentId);
uuid_id!(RoomId);

/// Who a search may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerScope {
    /// Records owned by this agent
    Agent(AgentId),
    /// Records owned by this agent plus records shared with every agent
    AgentOrShared(AgentId),
    User(UserId),
}

/// Typed equality criteria for similarity searches.
///
/// Translated into the store's query language only at the storage boundary
/// (`Filter::from(&criteria)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Table tag ("messages", "facts", ...)
    pub table: Option<String>,
    pub owner: Option<OwnerScope>,
    pub room_id: Option<RoomId>,
    pub unique_only: bool,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn owner(mut self, owner: OwnerScope) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn unique_only(mut self, unique_only: bool) -> Self {
        self.unique_only = unique_only;
        self
    }
}

/// A value paired with its rank during selection. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<T, S> {
    pub item: T,
    pub score: S,
}

impl<T, S> ScoredCandidate<T, S> {
    pub fn new(item: T, score: S) -> Self {
        Self { item, score }
    }
}
