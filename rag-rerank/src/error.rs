use thiserror::Error;

/// Errors specific to the rerank/merge stage, narrower than `rag_core::AppError`
/// and convertible into it at the plugin boundary.
#[derive(Error, Debug)]
pub enum RerankError {
    #[error(transparent)]
    App(#[from] rag_core::AppError),
}

impl From<RerankError> for rag_core::AppError {
    fn from(e: RerankError) -> Self {
        match e {
            RerankError::App(inner) => inner,
        }
    }
}
