use thiserror::Error;

/// Failures raised by a document or object store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `update_fields` targeted a document that does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Object path that would resolve outside the store root.
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors surfaced to callers of the messaging operations.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Rejected before any store call.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// A persisted document could not be decoded into its schema record.
    #[error("malformed record at {path}: {source}")]
    MalformedRecord {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = MessagingError> = std::result::Result<T, E>;
