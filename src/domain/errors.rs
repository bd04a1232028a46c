use thiserror::Error;

/// Errors surfaced by the queue core. Store lookups that find nothing return
/// `Ok(None)`/`Ok(0)` rather than an error; only genuine storage or wiring
/// failures end up here.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

pub type QueueResult<T> = Result<T, QueueError>;
