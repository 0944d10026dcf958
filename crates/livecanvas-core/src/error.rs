//! Error types for the synchronization core.

use thiserror::Error;

/// Errors raised while mediating between the canvas and the shared document.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("object has no objectId")]
    MissingObjectId,
    #[error("unknown shape kind: {0}")]
    UnknownShapeKind(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("record key {key} does not match objectId {object_id}")]
    KeyMismatch { key: String, object_id: String },
    #[error("storage error: {0}")]
    Storage(#[from] loro::LoroError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid attribute {field}: {value:?}")]
    InvalidAttribute { field: String, value: String },
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
