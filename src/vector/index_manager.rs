//! Startup probe for native vector search.
//!
//! The probe walks the store's capabilities once and settles the shared
//! [`CapabilityFlag`]:
//!
//! 1. no server support: `Disabled`, scalar fallback index on the embedding
//! 2. support: create the vector index on every searchable collection
//! 3. a sharded collection the vector index cannot serve: drop the vector
//!    indexes again, build the fallback index, `Disabled`
//! 4. otherwise `Enabled`
//!
//! Any store error along the way ends in `Disabled`. The probe never fails.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::capability::{CapabilityFlag, CapabilityState};
use crate::config::VectorConfig;
use crate::storage::{
    DocumentStore, IndexSpec, SimilarityMetric, StoreResult, VectorIndexOptions,
};

#[derive(Debug)]
pub struct VectorIndexManager {
    flag: Arc<CapabilityFlag>,
    index_name: String,
    embedding_field: String,
    collections: Vec<String>,
    options: VectorIndexOptions,
}

impl VectorIndexManager {
    pub fn new(config: &VectorConfig) -> Self {
        Self::with_flag(config, Arc::new(CapabilityFlag::new()))
    }

    /// Share an existing flag, typically the one the router reads.
    pub fn with_flag(config: &VectorConfig, flag: Arc<CapabilityFlag>) -> Self {
        Self {
            flag,
            index_name: config.index_name.clone(),
            embedding_field: config.embedding_field.clone(),
            collections: config.collections.clone(),
            options: VectorIndexOptions {
                dimension: config.dimension,
                metric: SimilarityMetric::Cosine,
                m: config.hnsw_m,
                ef_construction: config.hnsw_ef_construction,
            },
        }
    }

    pub fn flag(&self) -> Arc<CapabilityFlag> {
        Arc::clone(&self.flag)
    }

    pub fn state(&self) -> CapabilityState {
        self.flag.get()
    }

    pub fn vector_index_spec(&self) -> IndexSpec {
        IndexSpec::vector(&self.index_name, &self.embedding_field, self.options.clone())
    }

    pub fn fallback_index_spec(&self) -> IndexSpec {
        IndexSpec::scalar(&self.embedding_field)
    }

    /// Probe the store, create whatever indexes the outcome needs and
    /// publish the resulting state.
    pub async fn probe_and_initialize<S>(&self, store: &S) -> CapabilityState
    where
        S: DocumentStore + ?Sized,
    {
        let state = match self.probe(store).await {
            Ok(state) => state,
            Err(error) => {
                warn!(%error, "Vector capability probe failed, using brute-force search");
                self.ensure_fallback_indexes(store).await;
                CapabilityState::Disabled
            }
        };
        self.flag.set(state);
        info!(state = %state, "Vector search capability settled");
        state
    }

    async fn probe<S>(&self, store: &S) -> StoreResult<CapabilityState>
    where
        S: DocumentStore + ?Sized,
    {
        let status = store.server_status().await?;
        if !status.vector_search {
            info!(version = %status.version, "Store has no native vector search");
            self.ensure_fallback_indexes(store).await;
            return Ok(CapabilityState::Disabled);
        }

        let spec = self.vector_index_spec();
        for collection in &self.collections {
            if store.ensure_index(collection, spec.clone()).await? {
                info!(collection, index = %spec.name, "Created vector index");
            } else {
                debug!(collection, index = %spec.name, "Vector index already present");
            }
        }

        for collection in &self.collections {
            let shards = store.shard_status(collection).await?;
            if shards.sharded && !status.sharded_vector_search {
                warn!(
                    collection,
                    shard_key = ?shards.shard_key,
                    "Vector index unusable on sharded collection, reverting to brute-force search"
                );
                self.drop_vector_indexes(store).await;
                self.ensure_fallback_indexes(store).await;
                return Ok(CapabilityState::Disabled);
            }
        }

        Ok(CapabilityState::Enabled)
    }

    async fn ensure_fallback_indexes<S>(&self, store: &S)
    where
        S: DocumentStore + ?Sized,
    {
        let spec = self.fallback_index_spec();
        for collection in &self.collections {
            match store.ensure_index(collection, spec.clone()).await {
                Ok(true) => info!(collection, index = %spec.name, "Created fallback index"),
                Ok(false) => {}
                Err(error) => warn!(collection, %error, "Could not create fallback index"),
            }
        }
    }

    async fn drop_vector_indexes<S>(&self, store: &S)
    where
        S: DocumentStore + ?Sized,
    {
        for collection in &self.collections {
            if let Err(error) = store.drop_index(collection, &self.index_name).await {
                warn!(collection, %error, "Could not drop vector index");
            }
        }
    }
}
