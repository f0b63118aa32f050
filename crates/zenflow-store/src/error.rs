use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("task id prefix '{prefix}' matches more than one task")]
    AmbiguousId { prefix: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
