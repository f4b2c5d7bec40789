//! Outbound boundary to the document database.
//!
//! Everything above this module talks to the store through [`DocumentStore`]
//! with typed [`Filter`]s, so the ranking code never sees a wire format.
//! [`InMemoryStore`] is the bundled backend; its capability switches let every
//! branch of the vector-index state machine run without a live server.

pub mod error;
pub mod fields;
pub mod filter;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use fields::{Field, KNOWLEDGE, MEMORIES};
pub use filter::{Filter, compare_values, get_path};
pub use memory::{InMemoryStore, StoreCapabilities};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// Server-level capability report used by the vector index probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Server version string, informational only
    pub version: String,
    /// Server supports native vector search indexes
    pub vector_search: bool,
    /// Vector search indexes also work on sharded collections
    pub sharded_vector_search: bool,
}

/// Partitioning status of a single collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatus {
    pub sharded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shard_key: Vec<String>,
}

/// Fixed vector index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexOptions {
    pub dimension: usize,
    pub metric: SimilarityMetric,
    /// HNSW graph degree
    pub m: usize,
    /// HNSW build-time candidate list size
    pub ef_construction: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    Cosine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexKind {
    /// Ascending scalar index
    Scalar,
    Vector(VectorIndexOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub field: String,
    pub kind: IndexKind,
}

impl IndexSpec {
    pub fn scalar(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: format!("{}_1", field.replace('.', "_")),
            field,
            kind: IndexKind::Scalar,
        }
    }

    pub fn vector(
        name: impl Into<String>,
        field: impl Into<String>,
        options: VectorIndexOptions,
    ) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            kind: IndexKind::Vector(options),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.kind, IndexKind::Vector(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: usize,
    pub limit: Option<usize>,
    pub sort: Option<(String, SortOrder)>,
}

impl FindOptions {
    pub fn page(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
            sort: None,
        }
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }
}

/// Native approximate nearest-neighbour request.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchRequest {
    pub index: String,
    pub path: String,
    pub query_vector: Vec<f32>,
    /// Size of the candidate pool examined before `limit` is applied
    pub num_candidates: usize,
    pub limit: usize,
    pub filter: Filter,
}

/// A document with the similarity score the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Abstraction over document database backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check that the connection is usable
    async fn ping(&self) -> StoreResult<()>;

    /// Release the connection; later calls fail with `Unavailable`
    async fn close(&self) -> StoreResult<()>;

    async fn server_status(&self) -> StoreResult<ServerStatus>;

    async fn shard_status(&self, collection: &str) -> StoreResult<ShardStatus>;

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>>;

    async fn create_index(&self, collection: &str, spec: IndexSpec) -> StoreResult<()>;

    async fn drop_index(&self, collection: &str, name: &str) -> StoreResult<()>;

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>>;

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Delete matching documents, returning how many were removed
    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    async fn vector_search(
        &self,
        collection: &str,
        request: VectorSearchRequest,
    ) -> StoreResult<Vec<ScoredDocument>>;

    /// Find the first matching document
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let mut docs = self
            .find(
                collection,
                filter,
                FindOptions {
                    limit: Some(1),
                    ..FindOptions::default()
                },
            )
            .await?;
        Ok(docs.pop())
    }

    /// Create an index unless one with the same name already exists.
    ///
    /// Returns `true` when the index was created by this call.
    async fn ensure_index(&self, collection: &str, spec: IndexSpec) -> StoreResult<bool> {
        let existing = self.list_indexes(collection).await?;
        if existing.iter().any(|idx| idx.name == spec.name) {
            return Ok(false);
        }
        self.create_index(collection, spec).await?;
        Ok(true)
    }
}
