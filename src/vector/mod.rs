//! Vector similarity search.
//!
//! # Architecture
//! [`VectorIndexManager`] probes the store once at startup and publishes a
//! [`CapabilityState`] through a shared [`CapabilityFlag`]. The
//! [`SimilaritySearchRouter`] reads that flag on every request and picks the
//! native vector index or the brute-force cosine scan. Readers never block;
//! a stale `Enabled` only costs one extra native attempt before fallback.

mod capability;
mod index_manager;
mod knowledge;
mod router;
mod similarity;

pub use capability::{CapabilityFlag, CapabilityState};
pub use index_manager::VectorIndexManager;
pub use knowledge::{KeywordScorer, KnowledgeMatch};
pub use router::{
    FallbackSearch, NativeSearch, SearchStrategy, SimilarityRequest, SimilaritySearchRouter,
};
pub use similarity::{cosine_similarity, embedding_from_value};
