//! Memory and knowledge search over document stores with optional native
//! vector indexes.

pub mod config;
pub mod error;
pub mod fuzzy;
pub mod logging;
pub mod memory;
pub mod storage;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{DemotionPolicy, Settings};
pub use error::{MemoryError, MemoryResult, SearchError, SearchResult, ValidationError};
pub use fuzzy::{BatchScanner, EditDistanceScorer, ScanOutcome, ScanStatus, TopKSelector};
pub use memory::{
    CachedEmbeddingsQuery, GetKnowledgeParams, GetMemoriesParams, MemoryStore,
    SearchByEmbeddingParams, SearchKnowledgeParams, SearchMemoriesParams,
};
pub use storage::{DocumentStore, Filter, InMemoryStore, StoreCapabilities, StoreError};
pub use types::{
    AgentId, CachedEmbedding, Content, ContentMetadata, KnowledgeId, KnowledgeItem, Memory,
    MemoryId, OwnerScope, RoomId, SearchCriteria, UserId,
};
pub use vector::{CapabilityState, SimilaritySearchRouter, VectorIndexManager};
