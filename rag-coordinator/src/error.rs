use thiserror::Error;

/// Errors specific to coordinating a retrieval pass, narrower than
/// `rag_core::AppError` and convertible into it at the plugin boundary.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("no retrieval engines registered")]
    NoEngines,

    #[error(transparent)]
    Engine(#[from] rag_engine_core::error::EngineError),

    #[error(transparent)]
    App(#[from] rag_core::AppError),
}

impl From<CoordinatorError> for rag_core::AppError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::App(inner) => inner,
            other => rag_core::AppError::RetrievalBackend(other.to_string()),
        }
    }
}
