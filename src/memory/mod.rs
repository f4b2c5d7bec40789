//! Memory and knowledge facade over a `DocumentStore`.

mod normalize;
mod params;
mod store;

pub use normalize::{decode, decode_lossy, normalize_document, timestamp_millis};
pub use params::{
    CachedEmbeddingsQuery, GetKnowledgeParams, GetMemoriesParams, SearchByEmbeddingParams,
    SearchKnowledgeParams, SearchMemoriesParams,
};
pub use store::MemoryStore;
