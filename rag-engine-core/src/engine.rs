use std::collections::HashMap;

use async_trait::async_trait;
use rag_core::model::{IndexEntry, SearchResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::filter::RetrievalFilter;

/// Which concrete backend an engine instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    Postgres,
    Qdrant,
    ElasticsearchV7,
    ElasticsearchV8,
    /// An in-process, non-persistent engine used by `rag-cli`'s
    /// demonstration wiring; never selected by `RETRIEVE_DRIVER` in a real
    /// deployment, only built directly by the CLI.
    Memory,
}

impl EngineType {
    /// Parses one entry of the comma-separated `RETRIEVE_DRIVER` env value
    /// (spec §6).
    #[must_use]
    pub fn parse_driver(s: &str) -> Option<Self> {
        match s.trim() {
            "postgres" => Some(Self::Postgres),
            "qdrant" => Some(Self::Qdrant),
            "elasticsearch_v7" => Some(Self::ElasticsearchV7),
            "elasticsearch_v8" => Some(Self::ElasticsearchV8),
            _ => None,
        }
    }
}

/// The retrieval capabilities an engine offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub keyword: bool,
    pub vector: bool,
}

/// Which physical index a delete/copy/retrieve operation targets, since
/// some engines store keyword and vector data in distinct structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Keyword,
    Vector,
}

/// Which id field a batch-delete call matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteIdKind {
    ChunkId,
    SourceId,
    KnowledgeId,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub ids: Vec<String>,
    pub dimension: u32,
    pub kind: StorageKind,
    pub id_kind: DeleteIdKind,
}

/// Parameters for a single `Retrieve`/`KeywordsRetrieve`/`VectorRetrieve`
/// call. `query_text` drives keyword search, `embedding` drives vector
/// search; `retrieve` dispatches on `kind`.
#[derive(Debug, Clone)]
pub struct RetrieveParams {
    pub filter: RetrievalFilter,
    pub kind: StorageKind,
    pub query_text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub dimension: u32,
    pub vector_threshold: f32,
    pub keyword_threshold: f32,
    pub match_count: usize,
}

impl RetrieveParams {
    #[must_use]
    pub fn threshold(&self) -> f32 {
        match self.kind {
            StorageKind::Keyword => self.keyword_threshold,
            StorageKind::Vector => self.vector_threshold,
        }
    }
}

pub const DEFAULT_COPY_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct CopyIndicesRequest {
    pub src_knowledge_base_id: String,
    pub knowledge_id_map: HashMap<String, String>,
    pub chunk_id_map: HashMap<String, String>,
    pub dst_knowledge_base_id: String,
    pub dimension: u32,
    pub kind: StorageKind,
    pub batch_size: usize,
}

impl CopyIndicesRequest {
    #[must_use]
    pub fn with_defaults(
        src_knowledge_base_id: impl Into<String>,
        dst_knowledge_base_id: impl Into<String>,
        dimension: u32,
        kind: StorageKind,
    ) -> Self {
        Self {
            src_knowledge_base_id: src_knowledge_base_id.into(),
            knowledge_id_map: HashMap::new(),
            chunk_id_map: HashMap::new(),
            dst_knowledge_base_id: dst_knowledge_base_id.into(),
            dimension,
            kind,
            batch_size: DEFAULT_COPY_BATCH_SIZE,
        }
    }
}

/// Rewrites a `source_id` for its copy into `target_chunk`, per spec §4.2's
/// copy-indices rule: regular chunks get `target_chunk` verbatim, generated
/// questions keep their `-<question_id>` suffix, anything else mints a
/// fresh id rather than risk a collision.
#[must_use]
pub fn rewrite_source_id(source_id: &str, chunk_id: &str, target_chunk: &str) -> String {
    if source_id == chunk_id {
        target_chunk.to_string()
    } else if let Some(suffix) = source_id.strip_prefix(&format!("{chunk_id}-")) {
        format!("{target_chunk}-{suffix}")
    } else {
        Uuid::new_v4().to_string()
    }
}

/// `clamp(2*top_k, 100, 1000)`, the Postgres vector query's expansion rule
/// (spec §4.2); kept here since any engine doing an inner-ANN / outer-filter
/// two-stage query shares the same widening rule.
#[must_use]
pub fn expanded_top_k(top_k: usize) -> usize {
    (2 * top_k).clamp(100, 1000)
}

/// Uniform contract every storage backend implements (spec §4.2).
#[async_trait]
pub trait RetrievalEngine: Send + Sync {
    fn engine_type(&self) -> EngineType;
    fn capabilities(&self) -> Capabilities;

    async fn save(&self, entry: &IndexEntry) -> Result<(), EngineError>;

    /// Batch insert with "on conflict do nothing" semantics, so retries
    /// after a partial failure stay idempotent (spec §7).
    async fn batch_save(&self, entries: &[IndexEntry]) -> Result<(), EngineError>;

    async fn delete(&self, req: &DeleteRequest) -> Result<(), EngineError>;

    /// Dispatches to `keywords_retrieve`/`vector_retrieve` by `params.kind`.
    async fn retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
        match params.kind {
            StorageKind::Keyword => self.keywords_retrieve(params).await,
            StorageKind::Vector => self.vector_retrieve(params).await,
        }
    }

    async fn keywords_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError>;

    async fn vector_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError>;

    /// Copies entries from `src_knowledge_base_id` into
    /// `dst_knowledge_base_id`, remapping chunk/knowledge ids per the
    /// provided maps and the `rewrite_source_id` rule, paginated by
    /// `req.batch_size`. Returns the number of rows copied.
    async fn copy_indices(&self, req: &CopyIndicesRequest) -> Result<u64, EngineError>;

    async fn batch_update_chunk_enabled(&self, updates: &HashMap<String, bool>) -> Result<(), EngineError>;

    fn estimate_storage_size(&self, entries: &[IndexEntry], extras: u64) -> u64 {
        crate::storage_estimate::estimate_storage_size(entries, extras)
    }
}

#[cfg(test)]
mod tests {
    use super::{expanded_top_k, rewrite_source_id, EngineType};

    #[test]
    fn driver_parsing() {
        assert_eq!(EngineType::parse_driver("postgres"), Some(EngineType::Postgres));
        assert_eq!(EngineType::parse_driver("elasticsearch_v8"), Some(EngineType::ElasticsearchV8));
        assert_eq!(EngineType::parse_driver("bogus"), None);
    }

    #[test]
    fn expanded_top_k_is_clamped() {
        assert_eq!(expanded_top_k(10), 100);
        assert_eq!(expanded_top_k(100), 200);
        assert_eq!(expanded_top_k(10_000), 1000);
    }

    #[test]
    fn source_id_rewrite_rules() {
        assert_eq!(rewrite_source_id("c1", "c1", "c2"), "c2");
        assert_eq!(rewrite_source_id("c1-q3", "c1", "c2"), "c2-q3");
        let fresh = rewrite_source_id("unrelated", "c1", "c2");
        assert_ne!(fresh, "c2");
        assert_eq!(fresh.len(), 36);
    }
}
