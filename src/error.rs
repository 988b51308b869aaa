use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a backend command. Sessions keep their optimistic state when they see one.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("sticker not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Command(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("window bus closed")]
    Closed,
    #[error("emit failed: {0}")]
    Emit(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("invalid payload: {0}")]
    Payload(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(value: serde_json::Error) -> Self {
        SyncError::Payload(value.to_string())
    }
}
