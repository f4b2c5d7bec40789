use super::{
    Document, DocumentStore, Filter, FindOptions, IndexSpec, ScoredDocument, ServerStatus,
    ShardStatus, SortOrder, StoreError, StoreResult, VectorSearchRequest, compare_values,
    get_path,
};
use crate::storage::Field;
use crate::vector::{cosine_similarity, embedding_from_value};
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

/// Feature switches of the in-memory backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub vector_search: bool,
    pub sharded: bool,
    pub sharded_vector_search: bool,
}

impl StoreCapabilities {
    /// A server with working native vector search on unsharded collections.
    pub fn native() -> Self {
        Self {
            vector_search: true,
            ..Self::default()
        }
    }
}

/// Process-local document store.
///
/// Clones share the same collections, like handles to one database.
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    collections: Arc<DashMap<String, Vec<Document>>>,
    indexes: Arc<DashMap<String, Vec<IndexSpec>>>,
    capabilities: StoreCapabilities,
    closed: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_capabilities(StoreCapabilities::default())
    }

    pub fn with_capabilities(capabilities: StoreCapabilities) -> Self {
        Self {
            collections: Arc::new(DashMap::new()),
            indexes: Arc::new(DashMap::new()),
            capabilities,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |docs| docs.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return Err(StoreError::Unavailable("connection closed".to_string()));
        }
        Ok(())
    }

    fn has_vector_index(&self, collection: &str, name: &str, path: &str) -> bool {
        self.indexes.get(collection).is_some_and(|specs| {
            specs
                .iter()
                .any(|spec| spec.is_vector() && spec.name == name && spec.field == path)
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_documents(docs: &mut [Document], field: &str, order: SortOrder) {
    docs.sort_by(|a, b| {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.ensure_open()
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, AtomicOrdering::Release);
        Ok(())
    }

    async fn server_status(&self) -> StoreResult<ServerStatus> {
        self.ensure_open()?;
        Ok(ServerStatus {
            version: concat!("memdex-inmemory-", env!("CARGO_PKG_VERSION")).to_string(),
            vector_search: self.capabilities.vector_search,
            sharded_vector_search: self.capabilities.sharded_vector_search,
        })
    }

    async fn shard_status(&self, _collection: &str) -> StoreResult<ShardStatus> {
        self.ensure_open()?;
        let shard_key = if self.capabilities.sharded {
            vec![Field::AgentId.to_string()]
        } else {
            Vec::new()
        };
        Ok(ShardStatus {
            sharded: self.capabilities.sharded,
            shard_key,
        })
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>> {
        self.ensure_open()?;
        Ok(self
            .indexes
            .get(collection)
            .map(|specs| specs.clone())
            .unwrap_or_default())
    }

    async fn create_index(&self, collection: &str, spec: IndexSpec) -> StoreResult<()> {
        self.ensure_open()?;
        if spec.is_vector() && !self.capabilities.vector_search {
            return Err(StoreError::Unsupported(format!(
                "vector index '{}' requires vector search support",
                spec.name
            )));
        }

        let mut specs = self.indexes.entry(collection.to_string()).or_default();
        let existing = specs.iter().position(|existing| existing.name == spec.name);
        match existing {
            Some(pos) if specs[pos] == spec => Ok(()),
            Some(_) => Err(StoreError::command(
                "createIndexes",
                format!("index '{}' already exists with different options", spec.name),
            )),
            None => {
                specs.push(spec);
                Ok(())
            }
        }
    }

    async fn drop_index(&self, collection: &str, name: &str) -> StoreResult<()> {
        self.ensure_open()?;
        let not_found = || StoreError::IndexNotFound {
            collection: collection.to_string(),
            index: name.to_string(),
        };
        let mut specs = self.indexes.get_mut(collection).ok_or_else(not_found)?;
        let before = specs.len();
        specs.retain(|spec| spec.name != name);
        if specs.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        self.ensure_open()?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if let Some(id) = document.get(Field::Id.as_str()) {
            if docs
                .iter()
                .any(|doc| doc.get(Field::Id.as_str()) == Some(id))
            {
                return Err(StoreError::command(
                    "insert",
                    format!("duplicate key {id} in collection '{collection}'"),
                ));
            }
        }
        docs.push(document);
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let mut matched: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, order)) = &options.sort {
            sort_documents(&mut matched, field, *order);
        }

        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(options.skip)
            .take(limit)
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.ensure_open()?;
        Ok(self.collections.get(collection).map_or(0, |docs| {
            docs.iter().filter(|doc| filter.matches(doc)).count() as u64
        }))
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.ensure_open()?;
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }

    async fn vector_search(
        &self,
        collection: &str,
        request: VectorSearchRequest,
    ) -> StoreResult<Vec<ScoredDocument>> {
        self.ensure_open()?;
        if !self.capabilities.vector_search {
            return Err(StoreError::Unsupported("$vectorSearch".to_string()));
        }
        if self.capabilities.sharded && !self.capabilities.sharded_vector_search {
            return Err(StoreError::command(
                "$vectorSearch",
                "vector search is not supported on sharded collections",
            ));
        }
        if !self.has_vector_index(collection, &request.index, &request.path) {
            return Err(StoreError::IndexNotFound {
                collection: collection.to_string(),
                index: request.index,
            });
        }

        let mut scored: Vec<ScoredDocument> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| request.filter.matches(doc))
                    .filter_map(|doc| {
                        let embedding = embedding_from_value(get_path(doc, &request.path)?)?;
                        if embedding.len() != request.query_vector.len() {
                            return None;
                        }
                        Some(ScoredDocument {
                            score: cosine_similarity(&request.query_vector, &embedding),
                            document: doc.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(request.num_candidates.min(request.limit));
        Ok(scored)
    }
}
