use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store is unavailable: {0}")]
    Unavailable(String),

    #[error("Store command '{command}' failed: {cause}")]
    CommandFailed { command: String, cause: String },

    #[error("Operation not supported by this store: {0}")]
    Unsupported(String),

    #[error("Index '{index}' not found on collection '{collection}'")]
    IndexNotFound { collection: String, index: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Shorthand for a failed store command.
    pub fn command(command: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::CommandFailed {
            command: command.into(),
            cause: cause.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
