use thiserror::Error;

/// Errors a `RetrievalEngine` implementation can raise, narrower than
/// `rag_core::AppError` and convertible into it at the coordinator
/// boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("dimension mismatch: entry has {actual}, engine configured for {expected}")]
    DimensionMismatch { expected: u32, actual: u32 },

    #[error("unsupported capability for this engine: {0}")]
    Unsupported(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for rag_core::AppError {
    fn from(e: EngineError) -> Self {
        rag_core::AppError::RetrievalBackend(e.to_string())
    }
}
