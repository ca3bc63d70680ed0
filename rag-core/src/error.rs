use thiserror::Error;

/// Canonical error type shared across the retrieval/rerank/pipeline crates.
///
/// Narrower crates (engines, coordinator, pipeline) define their own
/// `thiserror` enums for the errors specific to their dependencies and
/// convert into this one at the boundary, mirroring how the teacher's
/// `common::error::AppError` collects every collaborator's error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("model call failed: {0}")]
    ModelCall(String),

    #[error("failed to obtain chat model: {0}")]
    GetChatModel(String),

    #[error("failed to obtain rerank model: {0}")]
    GetRerankModel(String),

    /// Sentinel: the search stage produced no candidates. Plugins treat this
    /// as a non-fatal short-circuit rather than a hard failure (see
    /// `SEARCH_NOTHING` in the pipeline).
    #[error("search produced no candidates")]
    SearchNothing,

    #[error("retrieval backend error: {0}")]
    RetrievalBackend(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("tenant id missing from request context")]
    TenantMissing,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A plugin-scoped error, carrying the pipeline event kind it failed under.
///
/// Generalizes the teacher's per-stage error propagation (every
/// `PipelineStage::execute` in `retrieval-pipeline/src/pipeline/stages/mod.rs`
/// returns `Result<(), AppError>`) into a typed wrapper that records which
/// stage produced the error, per spec §4.1/§7.
#[derive(Error, Debug)]
#[error("plugin error in stage {kind:?}: {source}")]
pub struct PluginError {
    pub kind: crate::model::chat_context::EventKind,
    #[source]
    pub source: AppError,
}

impl PluginError {
    pub const fn new(kind: crate::model::chat_context::EventKind, source: AppError) -> Self {
        Self { kind, source }
    }

    /// True when the wrapped error is the `SearchNothing` sentinel, which the
    /// dispatcher treats as a non-fatal short-circuit rather than a fatal
    /// abort (spec §7).
    pub const fn is_search_nothing(&self) -> bool {
        matches!(self.source, AppError::SearchNothing)
    }
}
