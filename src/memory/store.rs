//! The `MemoryStore` facade.
//!
//! Owns the backend handle and the search components, and answers the
//! memory and knowledge operations on top of them. Every method takes
//! `&self` and may run concurrently; the only per-call state is a scorer
//! checked out of the pool for fuzzy scans.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::normalize::{decode, decode_lossy};
use super::params::{
    CachedEmbeddingsQuery, GetKnowledgeParams, GetMemoriesParams, SearchByEmbeddingParams,
    SearchKnowledgeParams, SearchMemoriesParams,
};
use crate::config::Settings;
use crate::error::{MemoryError, MemoryResult, ValidationError};
use crate::fuzzy::{BatchScanner, PageSource, ScanStatus, ScorerPool, TopKSelector};
use crate::storage::{
    Document, DocumentStore, Field, Filter, FindOptions, KNOWLEDGE, MEMORIES, SortOrder,
    StoreError, StoreResult, get_path,
};
use crate::types::{
    AgentId, CachedEmbedding, KnowledgeId, KnowledgeItem, Memory, MemoryId, OwnerScope, RoomId,
    SearchCriteria,
};
use crate::vector::{
    CapabilityState, KeywordScorer, SimilarityRequest, SimilaritySearchRouter,
    VectorIndexManager, embedding_from_value,
};

pub struct MemoryStore<S> {
    store: S,
    settings: Settings,
    index_manager: VectorIndexManager,
    router: SimilaritySearchRouter,
    keywords: KeywordScorer,
    scanner: BatchScanner,
    scorers: ScorerPool,
    probed: OnceCell<CapabilityState>,
}

impl<S: DocumentStore> MemoryStore<S> {
    /// Wire the search components over `store`. Nothing touches the store
    /// until [`init`](Self::init).
    pub fn new(store: S, settings: Settings) -> MemoryResult<Self> {
        settings
            .validate()
            .map_err(|reason| MemoryError::Config { reason })?;

        let index_manager = VectorIndexManager::new(&settings.vector);
        let router = SimilaritySearchRouter::new(&settings, index_manager.flag());
        let keywords = KeywordScorer::from(&settings.knowledge);
        let scanner = BatchScanner::new(settings.fuzzy.batch_size)
            .with_selector(TopKSelector::new(settings.fuzzy.quickselect_threshold));

        Ok(Self {
            store,
            settings,
            index_manager,
            router,
            keywords,
            scanner,
            scorers: ScorerPool::new(),
            probed: OnceCell::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ping the store and probe vector capability. Runs once; later calls
    /// return the state settled by the first one.
    pub async fn init(&self) -> MemoryResult<CapabilityState> {
        let state = self
            .probed
            .get_or_try_init(|| async {
                self.store.ping().await.map_err(MemoryError::store("ping"))?;
                let state = self.index_manager.probe_and_initialize(&self.store).await;
                info!(capability = %state, "Memory store ready");
                Ok::<_, MemoryError>(state)
            })
            .await?;
        Ok(*state)
    }

    pub async fn close(&self) -> MemoryResult<()> {
        self.store.close().await.map_err(MemoryError::store("close"))
    }

    /// Live capability, including any demotion since `init`
    pub fn capability(&self) -> CapabilityState {
        self.router.capability()
    }

    // ---- memories ----

    /// Persist a memory. With `check_unique`, the uniqueness flag is set
    /// from a nearest-neighbour lookup in the same room; otherwise it is
    /// `true`. The flag is never revisited.
    pub async fn create_memory(&self, mut memory: Memory, check_unique: bool) -> MemoryResult<Memory> {
        require_table(&memory.table)?;
        if let Some(embedding) = &memory.embedding {
            self.router.validate(embedding)?;
        }

        memory.unique = match (&memory.embedding, check_unique) {
            (Some(embedding), true) => {
                let params = SearchByEmbeddingParams::new(&memory.table, memory.agent_id)
                    .room(memory.room_id)
                    .threshold(self.settings.search.uniqueness_threshold)
                    .count(1);
                self.search_by_embedding(embedding, &params).await?.is_empty()
            }
            _ => true,
        };

        let document = to_document(&memory)?;
        self.store
            .insert(MEMORIES, document)
            .await
            .map_err(MemoryError::store("create_memory"))?;
        debug!(id = %memory.id, table = %memory.table, unique = memory.unique, "Stored memory");
        Ok(memory)
    }

    pub async fn get_memory_by_id(&self, id: MemoryId) -> MemoryResult<Option<Memory>> {
        self.store
            .find_one(MEMORIES, &Filter::eq(Field::Id, id.to_string()))
            .await
            .map_err(MemoryError::store("get_memory_by_id"))?
            .map(decode)
            .transpose()
    }

    pub async fn get_memories(&self, params: &GetMemoriesParams) -> MemoryResult<Vec<Memory>> {
        require_table(&params.table)?;
        let mut criteria = SearchCriteria::new()
            .table(&params.table)
            .room(params.room_id)
            .unique_only(params.unique);
        if let Some(agent) = params.agent_id {
            criteria = criteria.owner(OwnerScope::Agent(agent));
        }

        let docs = self
            .store
            .find(MEMORIES, &Filter::from(&criteria), FindOptions::default())
            .await
            .map_err(MemoryError::store("get_memories"))?;

        // Older writers store `createdAt` as strings or `$date` objects, so the
        // window and the order are applied once timestamps are normalized.
        let start = params.start.map(|t| t.timestamp_millis());
        let end = params.end.map(|t| t.timestamp_millis());
        let mut memories: Vec<Memory> = decode_lossy(docs);
        memories.retain(|memory| {
            let millis = memory.created_at.timestamp_millis();
            start.is_none_or(|start| millis >= start) && end.is_none_or(|end| millis <= end)
        });
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(count) = params.count {
            memories.truncate(count);
        }
        Ok(memories)
    }

    pub async fn count_memories(&self, room_id: RoomId, table: &str, unique: bool) -> MemoryResult<u64> {
        require_table(table)?;
        let criteria = SearchCriteria::new()
            .table(table)
            .room(room_id)
            .unique_only(unique);
        self.store
            .count(MEMORIES, &Filter::from(&criteria))
            .await
            .map_err(MemoryError::store("count_memories"))
    }

    /// Returns `true` if a memory was removed.
    pub async fn remove_memory(&self, id: MemoryId, table: &str) -> MemoryResult<bool> {
        require_table(table)?;
        let filter = Filter::eq(Field::Id, id.to_string()).and(Filter::eq(Field::Table, table));
        let removed = self
            .store
            .delete(MEMORIES, &filter)
            .await
            .map_err(MemoryError::store("remove_memory"))?;
        Ok(removed > 0)
    }

    pub async fn remove_all_memories(&self, room_id: RoomId, table: &str) -> MemoryResult<u64> {
        require_table(table)?;
        let criteria = SearchCriteria::new().table(table).room(room_id);
        self.store
            .delete(MEMORIES, &Filter::from(&criteria))
            .await
            .map_err(MemoryError::store("remove_all_memories"))
    }

    // ---- search ----

    /// Memories in a room most similar to `params.embedding`.
    pub async fn search(&self, params: &SearchMemoriesParams) -> MemoryResult<Vec<Memory>> {
        require_table(&params.table)?;
        let mut criteria = SearchCriteria::new()
            .table(&params.table)
            .room(params.room_id)
            .unique_only(params.unique);
        if let Some(agent) = params.agent_id {
            criteria = criteria.owner(OwnerScope::Agent(agent));
        }
        self.similar_memories(&criteria, &params.embedding, params.count, params.match_threshold)
            .await
    }

    /// An agent's memories most similar to `embedding`.
    pub async fn search_by_embedding(
        &self,
        embedding: &[f32],
        params: &SearchByEmbeddingParams,
    ) -> MemoryResult<Vec<Memory>> {
        require_table(&params.table)?;
        let mut criteria = SearchCriteria::new()
            .table(&params.table)
            .owner(OwnerScope::Agent(params.agent_id))
            .unique_only(params.unique);
        if let Some(room) = params.room_id {
            criteria = criteria.room(room);
        }
        self.similar_memories(&criteria, embedding, params.count, params.match_threshold)
            .await
    }

    /// Embeddings of the memories whose text field is closest to
    /// `query.input` by edit distance, closest first.
    pub async fn get_cached_embeddings(
        &self,
        query: &CachedEmbeddingsQuery,
    ) -> MemoryResult<Vec<CachedEmbedding>> {
        self.get_cached_embeddings_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Like [`get_cached_embeddings`](Self::get_cached_embeddings); a
    /// cancelled token stops the scan and returns what was ranked so far.
    pub async fn get_cached_embeddings_with_cancel(
        &self,
        query: &CachedEmbeddingsQuery,
        cancel: &CancellationToken,
    ) -> MemoryResult<Vec<CachedEmbedding>> {
        require_table(&query.table)?;
        if query.match_count == 0 {
            return Ok(Vec::new());
        }

        let embedding_field = self.settings.vector.embedding_field.as_str();
        let source = CachedFieldSource {
            store: &self.store,
            filter: Filter::eq(Field::Table, query.table.as_str())
                .and(Filter::exists(&query.field_path))
                .and(Filter::exists(embedding_field)),
            field_path: &query.field_path,
            embedding_field,
        };
        let scanner = if query.max_distance == usize::MAX {
            self.scanner
        } else {
            self.scanner.with_max_distance(query.max_distance)
        };

        let mut scorer = self.scorers.checkout();
        let outcome = scanner
            .scan_and_rank(
                &source,
                &query.input,
                &mut scorer,
                candidate_text,
                query.match_count,
                cancel,
            )
            .await;

        let results: Vec<CachedEmbedding> = outcome
            .results
            .into_iter()
            .filter_map(|candidate| {
                Some(CachedEmbedding {
                    embedding: candidate.item.embedding?,
                    levenshtein_score: candidate.score,
                })
            })
            .collect();

        match outcome.status {
            ScanStatus::Interrupted { error, .. } if results.is_empty() => {
                Err(MemoryError::ScanFailed {
                    table: query.table.clone(),
                    source: error,
                })
            }
            _ => Ok(results),
        }
    }

    // ---- knowledge ----

    pub async fn create_knowledge(&self, item: KnowledgeItem) -> MemoryResult<KnowledgeItem> {
        if let Some(embedding) = &item.embedding {
            self.router.validate(embedding)?;
        }
        let document = to_document(&item)?;
        self.store
            .insert(KNOWLEDGE, document)
            .await
            .map_err(MemoryError::store("create_knowledge"))?;
        debug!(id = %item.id, shared = item.is_shared, "Stored knowledge item");
        Ok(item)
    }

    pub async fn get_knowledge(&self, params: &GetKnowledgeParams) -> MemoryResult<Vec<KnowledgeItem>> {
        let mut filter = Filter::All;
        if let Some(id) = params.id {
            filter = filter.and(Filter::eq(Field::Id, id.to_string()));
        }
        if let Some(agent) = params.agent_id {
            let criteria = SearchCriteria::new().owner(OwnerScope::AgentOrShared(agent));
            filter = filter.and(Filter::from(&criteria));
        }
        let options = FindOptions {
            limit: params.limit,
            ..FindOptions::default()
        };
        let docs = self
            .store
            .find(KNOWLEDGE, &filter, options)
            .await
            .map_err(MemoryError::store("get_knowledge"))?;
        Ok(decode_lossy(docs))
    }

    /// Remove a knowledge document together with its chunks.
    pub async fn remove_knowledge(&self, id: KnowledgeId) -> MemoryResult<u64> {
        let id = id.to_string();
        let filter = Filter::Or(vec![
            Filter::eq(Field::Id, id.as_str()),
            Filter::eq(Field::OriginalId, id.as_str()),
        ]);
        self.store
            .delete(KNOWLEDGE, &filter)
            .await
            .map_err(MemoryError::store("remove_knowledge"))
    }

    /// Remove an agent's knowledge, and shared knowledge when `shared` is set.
    pub async fn clear_knowledge(&self, agent_id: AgentId, shared: bool) -> MemoryResult<u64> {
        let owner = if shared {
            OwnerScope::AgentOrShared(agent_id)
        } else {
            OwnerScope::Agent(agent_id)
        };
        let filter = Filter::from(&SearchCriteria::new().owner(owner));
        self.store
            .delete(KNOWLEDGE, &filter)
            .await
            .map_err(MemoryError::store("clear_knowledge"))
    }

    /// Knowledge visible to an agent, ranked by similarity times the
    /// keyword multiplier.
    pub async fn search_knowledge(
        &self,
        params: &SearchKnowledgeParams,
    ) -> MemoryResult<Vec<KnowledgeItem>> {
        let search = &self.settings.search;
        let criteria = SearchCriteria::new().owner(OwnerScope::AgentOrShared(params.agent_id));
        let request = SimilarityRequest::new(
            KNOWLEDGE,
            params.embedding.clone(),
            params.match_count.unwrap_or(search.default_match_count),
        )
        .with_filter(Filter::from(&criteria))
        .with_threshold(params.match_threshold.unwrap_or(search.default_match_threshold));

        let matches = self
            .router
            .search_knowledge(
                &self.store,
                &request,
                params.search_text.as_deref(),
                &self.keywords,
            )
            .await?;

        Ok(matches
            .into_iter()
            .filter_map(|hit| match decode::<KnowledgeItem>(hit.document) {
                Ok(mut item) => {
                    item.similarity = Some(hit.similarity);
                    item.score = Some(hit.score);
                    Some(item)
                }
                Err(error) => {
                    warn!(%error, "Skipping undecodable knowledge item");
                    None
                }
            })
            .collect())
    }

    async fn similar_memories(
        &self,
        criteria: &SearchCriteria,
        embedding: &[f32],
        count: Option<usize>,
        threshold: Option<f32>,
    ) -> MemoryResult<Vec<Memory>> {
        let search = &self.settings.search;
        let request = SimilarityRequest::new(
            MEMORIES,
            embedding.to_vec(),
            count.unwrap_or(search.default_match_count),
        )
        .with_filter(Filter::from(criteria))
        .with_threshold(threshold.unwrap_or(search.default_match_threshold));

        let hits = self.router.search(&self.store, &request).await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| match decode::<Memory>(hit.document) {
                Ok(mut memory) => {
                    memory.similarity = Some(hit.score);
                    Some(memory)
                }
                Err(error) => {
                    warn!(%error, "Skipping undecodable memory");
                    None
                }
            })
            .collect())
    }
}

fn require_table(table: &str) -> Result<(), ValidationError> {
    if table.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "table" });
    }
    Ok(())
}

fn to_document<T: Serialize>(record: &T) -> MemoryResult<Document> {
    match serde_json::to_value(record) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(MemoryError::Decode {
            id: String::new(),
            reason: format!("record serialized to a non-object value: {other}"),
        }),
        Err(e) => Err(MemoryError::store("serialize")(StoreError::from(e))),
    }
}

/// One record of a cached-embedding scan.
struct CachedCandidate {
    embedding: Option<Vec<f32>>,
    text: Option<String>,
}

/// Records without an embedding are not worth ranking.
fn candidate_text(candidate: &CachedCandidate) -> Option<&str> {
    candidate.embedding.as_ref().and(candidate.text.as_deref())
}

struct CachedFieldSource<'a, S: ?Sized> {
    store: &'a S,
    filter: Filter,
    field_path: &'a str,
    embedding_field: &'a str,
}

#[async_trait]
impl<'a, S> PageSource for CachedFieldSource<'a, S>
where
    S: DocumentStore + ?Sized,
{
    type Item = CachedCandidate;

    async fn total(&self) -> StoreResult<u64> {
        self.store.count(MEMORIES, &self.filter).await
    }

    async fn fetch_page(&self, offset: usize, limit: usize) -> StoreResult<Vec<CachedCandidate>> {
        // Sorted so pages do not overlap between calls
        let options = FindOptions::page(offset, limit).sorted_by(Field::Id, SortOrder::Ascending);
        let docs = self.store.find(MEMORIES, &self.filter, options).await?;
        Ok(docs
            .iter()
            .map(|doc| CachedCandidate {
                embedding: get_path(doc, self.embedding_field).and_then(embedding_from_value),
                text: get_path(doc, self.field_path)
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect())
    }
}
