use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::search_result::SearchResult;

/// Internal pipeline event kinds, dispatched by the `EventManager`.
///
/// Registration order within a kind is stable; see crate `rag-pipeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RewriteQuery,
    EntitySearch,
    ChunkSearch,
    ChunkSearchParallel,
    ChunkRerank,
    ChunkMerge,
    FilterTopK,
    IntoChatMessage,
    ChatCompletion,
    ChatCompletionStream,
    StreamFilter,
}

/// Whether a search target scopes to an entire knowledge base or to a
/// specific set of knowledge documents within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Kb,
    Knowledge,
}

/// One entry of `ChatContext.search_targets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTarget {
    pub kb_id: String,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    #[serde(default)]
    pub knowledge_ids: Vec<String>,
}

/// One prior conversation turn, as far as retrieval needs it: the cached
/// knowledge references a past turn resolved, consulted by history recall
/// (spec §4.3 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub turn_id: String,
    #[serde(default)]
    pub knowledge_references: Vec<SearchResult>,
}

/// An entity pre-extracted upstream of retrieval (by the caller's NLU/agent
/// layer), consumed by the entity-graph join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Nodes/relations returned by a graph repository join, folded back into
/// `search_result` by the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphResult {
    pub node_ids: Vec<String>,
    pub relation_ids: Vec<String>,
}

/// Mutable per-request bag threaded through the plugin chain.
///
/// The dispatcher exclusively owns this during the synchronous chain;
/// parallel stages operate on cheap shadow copies (produced by
/// [`ChatContext::shadow`]) and fold their results back under a single
/// writer at join, per §5's "shared mutable `ChatContext`" redesign note.
#[derive(Debug, Clone)]
pub struct ChatContext {
    // Inputs
    pub session_id: String,
    pub tenant_id: String,
    pub query: String,
    pub knowledge_base_ids: Vec<String>,
    pub knowledge_ids: Vec<String>,
    pub search_targets: Vec<SearchTarget>,
    pub embedding_top_k: usize,
    pub vector_threshold: f32,
    pub keyword_threshold: f32,
    pub rerank_top_k: usize,
    pub rerank_threshold: f32,
    pub enable_rewrite: bool,
    pub enable_query_expansion: bool,
    pub web_search_enabled: bool,
    pub fallback_response: String,
    pub no_match_prefix: Option<String>,

    // Working state
    pub rewrite_query: Option<String>,
    pub history: Vec<HistoryTurn>,
    pub entity: Vec<Entity>,
    pub entity_kb_ids: Vec<String>,
    pub entity_knowledge: HashMap<String, Vec<String>>,
    pub search_result: Vec<SearchResult>,
    pub graph_result: Option<GraphResult>,
    pub rerank_result: Vec<SearchResult>,
    pub merge_result: Vec<SearchResult>,
    pub event_bus: Option<Arc<crate::model::stream_event::EventBusHandle>>,
}

impl ChatContext {
    /// Builds a fresh context from the caller-supplied inputs, leaving all
    /// working-state accumulators empty.
    #[must_use]
    pub fn new(session_id: impl Into<String>, tenant_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            tenant_id: tenant_id.into(),
            query: query.into(),
            knowledge_base_ids: Vec::new(),
            knowledge_ids: Vec::new(),
            search_targets: Vec::new(),
            embedding_top_k: 20,
            vector_threshold: 0.0,
            keyword_threshold: 0.0,
            rerank_top_k: 10,
            rerank_threshold: 0.5,
            enable_rewrite: true,
            enable_query_expansion: true,
            web_search_enabled: false,
            fallback_response: String::new(),
            no_match_prefix: None,
            rewrite_query: None,
            history: Vec::new(),
            entity: Vec::new(),
            entity_kb_ids: Vec::new(),
            entity_knowledge: HashMap::new(),
            search_result: Vec::new(),
            graph_result: None,
            rerank_result: Vec::new(),
            merge_result: Vec::new(),
            event_bus: None,
        }
    }

    /// The query the rest of the pipeline should search with: the rewritten
    /// query if the rewrite stage ran, else the original.
    #[must_use]
    pub fn effective_query(&self) -> &str {
        self.rewrite_query.as_deref().unwrap_or(&self.query)
    }

    /// A cheap clone carrying only the inputs and the fields a given
    /// parallel stage needs to read, with a fresh, empty `search_result`
    /// for that stage to write into. Callers merge the shadow's
    /// `search_result` back into the owning context at join, under a
    /// single writer.
    #[must_use]
    pub fn shadow(&self) -> Self {
        let mut shadow = self.clone();
        shadow.search_result = Vec::new();
        shadow.graph_result = None;
        shadow
    }

    /// Picks whichever of `{merge_result, rerank_result, search_result}` is
    /// non-empty, in that preference order, per the filter stage's rule
    /// (spec §4.6).
    #[must_use]
    pub fn filter_source(&self) -> &[SearchResult] {
        if !self.merge_result.is_empty() {
            &self.merge_result
        } else if !self.rerank_result.is_empty() {
            &self.rerank_result
        } else {
            &self.search_result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChatContext;

    #[test]
    fn effective_query_falls_back_to_original() {
        let ctx = ChatContext::new("s1", "t1", "how do kubelets rotate certs");
        assert_eq!(ctx.effective_query(), "how do kubelets rotate certs");
    }

    #[test]
    fn effective_query_prefers_rewrite() {
        let mut ctx = ChatContext::new("s1", "t1", "orig");
        ctx.rewrite_query = Some("rewritten".to_string());
        assert_eq!(ctx.effective_query(), "rewritten");
    }

    #[test]
    fn filter_source_prefers_merge_then_rerank_then_search() {
        let mut ctx = ChatContext::new("s1", "t1", "q");
        assert!(ctx.filter_source().is_empty());
    }

    #[test]
    fn shadow_clears_mutable_accumulators() {
        let mut ctx = ChatContext::new("s1", "t1", "q");
        ctx.entity_kb_ids.push("kb1".to_string());
        let shadow = ctx.shadow();
        assert!(shadow.search_result.is_empty());
        assert_eq!(shadow.entity_kb_ids, ctx.entity_kb_ids);
    }
}
