use thiserror::Error;

/// Errors surfaced by the bus/replay-store boundary, convertible into
/// `rag_core::AppError` at call sites that need the canonical type.
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EventBusError> for rag_core::AppError {
    fn from(e: EventBusError) -> Self {
        rag_core::AppError::InternalError(e.to_string())
    }
}
