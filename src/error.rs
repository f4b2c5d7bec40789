//! Error types for memdex
//!
//! This module provides structured error types using thiserror. Capability
//! probing and native-search failures never show up here: they are absorbed
//! by degrading to the fallback path. What remains is what a caller can act on.

use crate::storage::StoreError;
use thiserror::Error;

/// Bad input, reported before any store call is made
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Query embedding is empty")]
    EmptyEmbedding,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding component {index} is not a finite number")]
    NonFiniteEmbedding { index: usize },
}

/// Errors surfaced by the similarity search router
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The brute-force path failed too; the store itself is in trouble
    #[error("Fallback search on '{collection}' failed: {source}")]
    Fallback {
        collection: String,
        source: StoreError,
    },
}

/// Main error type for memory store operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Cached embedding scan on '{table}' failed before any result: {source}")]
    ScanFailed { table: String, source: StoreError },

    #[error("Store operation '{operation}' failed: {source}")]
    Store {
        operation: &'static str,
        source: StoreError,
    },

    #[error("Failed to decode stored document '{id}': {reason}")]
    Decode { id: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl MemoryError {
    /// Attach the operation name to a store error.
    pub fn store(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { operation, source }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Search(SearchError::Validation(_)) => "VALIDATION_ERROR",
            Self::Search(SearchError::Fallback { .. }) => "SEARCH_ERROR",
            Self::ScanFailed { .. } => "SCAN_FAILED",
            Self::Store { .. } => "STORE_ERROR",
            Self::Decode { .. } => "DECODE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Search(SearchError::Fallback { .. }) | Self::ScanFailed { .. } | Self::Store { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Validation(_) | Self::Search(SearchError::Validation(_)) => vec![
                "Check that table name and room scope are set",
                "Ensure the embedding comes from the configured model dimension",
            ],
            Self::Search(SearchError::Fallback { .. }) | Self::ScanFailed { .. } => vec![
                "The store rejected a plain scan; check connectivity and permissions",
                "Try the operation again, it may succeed on retry",
            ],
            Self::Store { .. } => vec!["Check that the store is reachable and not closed"],
            Self::Decode { .. } => vec![
                "The document was written by an incompatible writer",
                "Remove or rewrite the offending document",
            ],
            Self::Config { .. } => vec!["Fix the value in .memdex/settings.toml or MEMDEX_* env"],
        }
    }
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Result type alias for memory store operations
pub type MemoryResult<T> = Result<T, MemoryError>;
