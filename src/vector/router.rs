//! Dual-path similarity search.
//!
//! [`SimilaritySearchRouter`] reads the shared capability flag and sends a
//! request either to the store's native vector index ([`NativeSearch`]) or
//! to a brute-force cosine scan ([`FallbackSearch`]). A native failure is
//! never returned to the caller: the same request is retried on the
//! fallback path, and under [`DemotionPolicy::Permanent`] the flag is
//! demoted for the rest of the process. This is the only demotion point.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::capability::{CapabilityFlag, CapabilityState};
use super::knowledge::{KeywordScorer, KnowledgeMatch};
use super::similarity::{cosine_similarity, embedding_from_value};
use crate::config::{DemotionPolicy, Settings};
use crate::error::{SearchError, SearchResult, ValidationError};
use crate::fuzzy::TopKSelector;
use crate::storage::{
    DocumentStore, Field, Filter, FindOptions, ScoredDocument, SortOrder, StoreResult,
    VectorSearchRequest, get_path,
};

/// One similarity query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityRequest {
    pub collection: String,
    pub embedding: Vec<f32>,
    pub filter: Filter,
    pub limit: usize,
    /// Minimum cosine similarity, applied after either path
    pub threshold: Option<f32>,
}

impl SimilarityRequest {
    pub fn new(collection: impl Into<String>, embedding: Vec<f32>, limit: usize) -> Self {
        Self {
            collection: collection.into(),
            embedding,
            filter: Filter::All,
            limit,
            threshold: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// A way of answering a [`SimilarityRequest`].
///
/// Results come back ordered by descending score.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        store: &dyn DocumentStore,
        request: &SimilarityRequest,
    ) -> StoreResult<Vec<ScoredDocument>>;
}

/// Approximate search on the store's vector index.
#[derive(Debug, Clone)]
pub struct NativeSearch {
    index_name: String,
    path: String,
    candidate_multiplier: usize,
}

impl NativeSearch {
    pub fn new(
        index_name: impl Into<String>,
        path: impl Into<String>,
        candidate_multiplier: usize,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            path: path.into(),
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }
}

#[async_trait]
impl SearchStrategy for NativeSearch {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn search(
        &self,
        store: &dyn DocumentStore,
        request: &SimilarityRequest,
    ) -> StoreResult<Vec<ScoredDocument>> {
        let vector_request = VectorSearchRequest {
            index: self.index_name.clone(),
            path: self.path.clone(),
            query_vector: request.embedding.clone(),
            num_candidates: request.limit.saturating_mul(self.candidate_multiplier),
            limit: request.limit,
            filter: request.filter.clone(),
        };
        store.vector_search(&request.collection, vector_request).await
    }
}

/// Exact cosine ranking over a bounded candidate load.
#[derive(Debug, Clone)]
pub struct FallbackSearch {
    path: String,
    candidate_cap: usize,
    selector: TopKSelector,
}

impl FallbackSearch {
    pub fn new(path: impl Into<String>, candidate_cap: usize) -> Self {
        Self {
            path: path.into(),
            candidate_cap,
            selector: TopKSelector::default(),
        }
    }

    pub fn with_selector(mut self, selector: TopKSelector) -> Self {
        self.selector = selector;
        self
    }
}

#[async_trait]
impl SearchStrategy for FallbackSearch {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn search(
        &self,
        store: &dyn DocumentStore,
        request: &SimilarityRequest,
    ) -> StoreResult<Vec<ScoredDocument>> {
        let filter = request.filter.clone().and(Filter::exists(&self.path));
        // Id order keeps the capped load stable across backends
        let mut options = FindOptions::default().sorted_by(Field::Id, SortOrder::Ascending);
        options.limit = Some(self.candidate_cap);
        let candidates = store.find(&request.collection, &filter, options).await?;
        let loaded = candidates.len();

        let scored: Vec<ScoredDocument> = candidates
            .into_iter()
            .filter_map(|document| {
                let embedding = embedding_from_value(get_path(&document, &self.path)?)?;
                // Records from another model generation cannot be compared
                if embedding.len() != request.embedding.len() {
                    return None;
                }
                Some(ScoredDocument {
                    score: cosine_similarity(&request.embedding, &embedding),
                    document,
                })
            })
            .collect();

        debug!(
            collection = %request.collection,
            loaded,
            comparable = scored.len(),
            "Brute-force similarity scan"
        );
        Ok(self.selector.select(scored, request.limit, |c| -c.score))
    }
}

pub struct SimilaritySearchRouter {
    flag: Arc<CapabilityFlag>,
    native: Box<dyn SearchStrategy>,
    fallback: Box<dyn SearchStrategy>,
    policy: DemotionPolicy,
    dimension: Option<usize>,
    candidate_multiplier: usize,
}

impl SimilaritySearchRouter {
    /// Router over the store's own vector index and a brute-force scan,
    /// both configured from `settings`.
    pub fn new(settings: &Settings, flag: Arc<CapabilityFlag>) -> Self {
        let vector = &settings.vector;
        let native = NativeSearch::new(
            &vector.index_name,
            &vector.embedding_field,
            vector.candidate_multiplier,
        );
        let fallback = FallbackSearch::new(
            &vector.embedding_field,
            settings.search.fallback_candidate_cap,
        )
        .with_selector(TopKSelector::new(settings.fuzzy.quickselect_threshold));

        Self::with_strategies(flag, Box::new(native), Box::new(fallback))
            .with_policy(settings.search.demotion)
            .with_dimension(Some(vector.dimension))
            .with_candidate_multiplier(vector.candidate_multiplier)
    }

    pub fn with_strategies(
        flag: Arc<CapabilityFlag>,
        native: Box<dyn SearchStrategy>,
        fallback: Box<dyn SearchStrategy>,
    ) -> Self {
        Self {
            flag,
            native,
            fallback,
            policy: DemotionPolicy::default(),
            dimension: None,
            candidate_multiplier: 2,
        }
    }

    pub fn with_policy(mut self, policy: DemotionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reject query embeddings of any other length. `None` accepts all.
    pub fn with_dimension(mut self, dimension: Option<usize>) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    pub fn capability(&self) -> CapabilityState {
        self.flag.get()
    }

    pub fn validate(&self, embedding: &[f32]) -> Result<(), ValidationError> {
        if embedding.is_empty() {
            return Err(ValidationError::EmptyEmbedding);
        }
        if let Some(expected) = self.dimension {
            if embedding.len() != expected {
                return Err(ValidationError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        if let Some(index) = embedding.iter().position(|x| !x.is_finite()) {
            return Err(ValidationError::NonFiniteEmbedding { index });
        }
        Ok(())
    }

    /// Ranked documents for `request`, most similar first.
    pub async fn search(
        &self,
        store: &dyn DocumentStore,
        request: &SimilarityRequest,
    ) -> SearchResult<Vec<ScoredDocument>> {
        self.validate(&request.embedding)?;
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let mut results = match self.flag.get() {
            CapabilityState::Enabled => match self.native.search(store, request).await {
                Ok(results) => results,
                Err(error) => {
                    warn!(
                        collection = %request.collection,
                        strategy = self.native.name(),
                        %error,
                        "Native vector search failed, retrying with brute-force scan"
                    );
                    if self.policy == DemotionPolicy::Permanent && self.flag.demote() {
                        warn!("Native vector search disabled for the rest of this process");
                    }
                    self.run_fallback(store, request).await?
                }
            },
            CapabilityState::Disabled | CapabilityState::Unknown => {
                self.run_fallback(store, request).await?
            }
        };

        if let Some(threshold) = request.threshold {
            results.retain(|r| r.score >= threshold);
        }
        Ok(results)
    }

    /// Knowledge search: widen the candidate pool, then re-rank with the
    /// keyword multiplier. `request.threshold` is the similarity gate.
    pub async fn search_knowledge(
        &self,
        store: &dyn DocumentStore,
        request: &SimilarityRequest,
        search_text: Option<&str>,
        scorer: &KeywordScorer,
    ) -> SearchResult<Vec<KnowledgeMatch>> {
        let threshold = request.threshold.unwrap_or(0.0);
        let widened = SimilarityRequest {
            limit: request.limit.saturating_mul(self.candidate_multiplier),
            threshold: None,
            ..request.clone()
        };
        let candidates = self.search(store, &widened).await?;
        Ok(scorer.rank(candidates, search_text, threshold, request.limit))
    }

    async fn run_fallback(
        &self,
        store: &dyn DocumentStore,
        request: &SimilarityRequest,
    ) -> SearchResult<Vec<ScoredDocument>> {
        self.fallback
            .search(store, request)
            .await
            .map_err(|source| SearchError::Fallback {
                collection: request.collection.clone(),
                source,
            })
    }
}
