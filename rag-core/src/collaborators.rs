//! Traits for the systems the core assumes but does not implement: chat
//! models, embedders, rerankers, chunk/knowledge metadata lookup, graph
//! traversal, and web search (spec §1). Concrete implementations live
//! outside this workspace (or, for local exercising, as test/demo stubs in
//! `rag-cli`).

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// One token/delta from a streaming chat completion.
pub type ChatStreamItem = Result<String, AppError>;

/// `ChatModel`: the language model collaborator. `chat` answers in one
/// shot; `chat_stream` yields incremental deltas consumed by the streaming
/// plugin (spec §4.7).
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AppError>;

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<BoxStream<'static, ChatStreamItem>, AppError>;
}

/// `Embedder`: produces fixed-dimension vectors for a fixed embedding
/// model. `dimension()` is load-bearing: it drives which dimension-sharded
/// collection/table an engine writes to.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> u32;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// One passage's relevance score from a cross-encoder rerank call.
#[derive(Debug, Clone, Copy)]
pub struct RerankScore {
    pub index: usize,
    pub relevance: f32,
}

/// `Reranker`: scores `(query, passage)` pairs with a cross-encoder.
/// `rag-rerank` realizes this as a pool of leased engines rather than
/// requiring every caller to hold its own model instance.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<RerankScore>, AppError>;
}

/// A neighbor direction for chunk-neighbor traversal during short-context
/// expansion (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborDirection {
    Previous,
    Next,
}

/// A chunk row as the metadata store knows it, richer than
/// [`crate::model::SearchResult`] because it carries the link structure
/// (`pre_chunk_id`/`next_chunk_id`) and raw FAQ/image metadata the merge
/// stage needs but a `SearchResult` doesn't carry until enriched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: String,
    pub chunk_id: String,
    pub knowledge_id: String,
    pub knowledge_title: String,
    pub content: String,
    pub start_at: i64,
    pub end_at: i64,
    pub seq: i64,
    pub chunk_type: crate::model::ChunkType,
    pub parent_chunk_id: Option<String>,
    pub pre_chunk_id: Option<String>,
    pub next_chunk_id: Option<String>,
    #[serde(default)]
    pub image_info: serde_json::Value,
    #[serde(default)]
    pub chunk_metadata: Vec<u8>,
}

/// FAQ metadata for a `chunk_type = faq` row, used to render the canonical
/// `"Q: ...\nAnswer:\n- ..."` content (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqMetadata {
    pub question: String,
    pub answers: Vec<String>,
}

/// `ChunkRepository`: metadata lookup and direct-load support for chunks.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRow>, AppError>;

    async fn get_neighbor(&self, chunk_id: &str, direction: NeighborDirection) -> Result<Option<ChunkRow>, AppError>;

    /// All chunks belonging to `knowledge_ids`, for the direct-load fast
    /// path; callers check the combined count against the 50-chunk cutoff
    /// before calling, but implementors may also choose to early-return
    /// `Ok(None)` once the count is known to exceed an internal cap.
    async fn list_chunks_by_knowledge_ids(&self, knowledge_ids: &[String]) -> Result<Vec<ChunkRow>, AppError>;

    async fn count_chunks(&self, knowledge_ids: &[String]) -> Result<u64, AppError>;

    async fn get_faq_metadata(&self, chunk_id: &str) -> Result<Option<FaqMetadata>, AppError>;

    /// Generated-question strings parsed from a chunk's `chunk_metadata`,
    /// folded into rerank passages alongside image captions/OCR text
    /// (spec §4.4).
    async fn get_generated_questions(&self, chunk_id: &str) -> Result<Vec<String>, AppError>;
}

/// `KnowledgeRepository`: document-level metadata lookup.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    async fn get_title(&self, knowledge_id: &str) -> Result<Option<String>, AppError>;

    /// Creates (or reuses) a per-session ephemeral knowledge base used by
    /// the web-search compress-with-RAG step (spec §4.3 step 3).
    async fn ensure_ephemeral_kb(&self, session_id: &str) -> Result<String, AppError>;
}

/// One graph node/relation pair surfaced by an entity-graph join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub node_id: String,
    pub relation_id: String,
    pub chunk_id: String,
}

/// `GraphRepository`: entity relationship traversal, consumed by the
/// coordinator's entity-graph join (spec §4.3).
#[async_trait]
pub trait GraphRepository: Send + Sync {
    async fn find_by_entity(&self, kb_id: &str, knowledge_id: Option<&str>, entity: &str) -> Result<Vec<GraphEdge>, AppError>;
}

/// One web search hit, before the compress-with-RAG step converts it into
/// a `SearchResult` with `match_type = web`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// `WebSearchService`: the external provider the coordinator's web-search
/// step invokes when `web_search_enabled` and a tenant provider is
/// configured.
#[async_trait]
pub trait WebSearchService: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<WebSearchHit>, AppError>;
}
