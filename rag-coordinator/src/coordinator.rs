//! The retrieval coordinator (spec §4.3): for each search target, runs the
//! direct-load fast path, hybrid keyword+vector search, and (if the target
//! came up short) a bounded query-expansion retry, while an entity-graph
//! join runs concurrently across the whole request. Results are combined
//! with web search and history recall, then deduplicated once at the end.
//!
//! "`top_k`" in the spec's expansion-trigger and match-count formulas maps
//! onto `ChatContext.embedding_top_k` here, the only per-request top-k
//! knob besides `rerank_top_k`, which the formulas name separately.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use rag_concurrency::bounded_fanout;
use rag_core::collaborators::{ChunkRepository, Embedder, GraphRepository, KnowledgeRepository, WebSearchService};
use rag_core::model::chat_context::{ChatContext, SearchTarget, TargetKind};
use rag_core::model::SearchResult;
use rag_core::AppError;
use rag_engine_core::engine::{RetrievalEngine, RetrieveParams, StorageKind};
use rag_engine_core::filter::RetrievalFilter;
use tracing::instrument;

use crate::dedup;
use crate::direct_load;
use crate::graph::{self, GraphTarget};
use crate::query_expansion;
use crate::web_search;

/// Width of the query-expansion fan-out's semaphore (spec §5).
const EXPANSION_FANOUT_WIDTH: usize = 16;

/// Orchestrates one retrieval pass across every registered engine and
/// collaborator. Cheap to clone (everything inside is an `Arc`); build once
/// per process and share across requests.
#[derive(Clone)]
pub struct Coordinator {
    engines: Vec<Arc<dyn RetrievalEngine>>,
    chunks: Arc<dyn ChunkRepository>,
    knowledge: Arc<dyn KnowledgeRepository>,
    graph: Arc<dyn GraphRepository>,
    web_search: Option<Arc<dyn WebSearchService>>,
    embedder: Arc<dyn Embedder>,
}

impl Coordinator {
    #[must_use]
    pub fn new(
        engines: Vec<Arc<dyn RetrievalEngine>>,
        chunks: Arc<dyn ChunkRepository>,
        knowledge: Arc<dyn KnowledgeRepository>,
        graph: Arc<dyn GraphRepository>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self { engines, chunks, knowledge, graph, web_search: None, embedder }
    }

    #[must_use]
    pub fn with_web_search(mut self, web_search: Arc<dyn WebSearchService>) -> Self {
        self.web_search = Some(web_search);
        self
    }

    /// Runs the full coordinator pass, writing `ctx.search_result` and
    /// `ctx.graph_result`. Mirrors spec §5's "two concurrent tasks joined
    /// with a wait group" model: the main search (targets + web + history)
    /// and the entity-graph join run side by side against shadow state and
    /// are folded back under this single writer.
    #[instrument(skip(self, ctx), fields(session_id = %ctx.session_id, targets = ctx.search_targets.len()))]
    pub async fn run(&self, ctx: &mut ChatContext) -> Result<(), AppError> {
        if self.engines.is_empty() {
            return Err(crate::error::CoordinatorError::NoEngines.into());
        }

        let query = ctx.effective_query().to_string();
        let embedding = self.embedder.embed(&query).await?;
        let dim = self.embedder.dimension();

        let main_search = self.run_main_search(ctx, &query, &embedding, dim);
        let graph_join = self.run_graph_join(ctx);
        let (main_outcome, graph_outcome) = tokio::join!(main_search, graph_join);

        let mut combined = match (main_outcome, graph_outcome) {
            (Ok(main_results), Ok((graph_result, graph_results))) => {
                ctx.graph_result = Some(graph_result);
                let mut combined = main_results;
                combined.extend(graph_results);
                combined
            }
            (Ok(main_results), Err(e)) => {
                tracing::warn!(error = %e, "entity-graph join failed, continuing with main search only");
                main_results
            }
            (Err(e), Ok((graph_result, graph_results))) => {
                tracing::warn!(error = %e, "main search failed, continuing with entity-graph results only");
                ctx.graph_result = Some(graph_result);
                graph_results
            }
            (Err(main_err), Err(graph_err)) => {
                tracing::error!(graph_error = %graph_err, "both main search and entity-graph join failed");
                return Err(main_err);
            }
        };

        combined.extend(history_recall(ctx));

        ctx.search_result = dedup::dedup(combined);
        Ok(())
    }

    /// Target fan-out, web search, and (implicitly, per target) query
    /// expansion. Everything except the entity-graph join.
    async fn run_main_search(
        &self,
        ctx: &ChatContext,
        query: &str,
        embedding: &[f32],
        dim: u32,
    ) -> Result<Vec<SearchResult>, AppError> {
        let target_jobs = ctx.search_targets.iter().map(|target| {
            self.search_target(
                target,
                query,
                embedding,
                dim,
                ctx.vector_threshold,
                ctx.keyword_threshold,
                ctx.embedding_top_k,
                ctx.rerank_top_k,
                ctx.enable_query_expansion,
            )
        });
        let mut results: Vec<SearchResult> = join_all(target_jobs).await.into_iter().flatten().collect();

        if ctx.web_search_enabled {
            if let Some(web) = self.web_search.as_deref() {
                match web_search::search_and_compress(web, self.knowledge.as_ref(), &ctx.session_id, query).await {
                    Ok(hits) => results.extend(hits),
                    Err(e) => tracing::warn!(error = %e, "web search failed"),
                }
            }
        }

        Ok(results)
    }

    /// One target's direct-load attempt, hybrid search, and (if needed)
    /// query-expansion retry (spec §4.3 steps 1, 2, 4).
    #[allow(clippy::too_many_arguments)]
    async fn search_target(
        &self,
        target: &SearchTarget,
        query: &str,
        embedding: &[f32],
        dim: u32,
        vector_threshold: f32,
        keyword_threshold: f32,
        embedding_top_k: usize,
        rerank_top_k: usize,
        enable_query_expansion: bool,
    ) -> Vec<SearchResult> {
        if matches!(target.kind, TargetKind::Knowledge) {
            match direct_load::try_direct_load(self.chunks.as_ref(), &target.knowledge_ids).await {
                Ok(Some(results)) => return results,
                Ok(None) => {}
                Err(e) => tracing::warn!(kb = %target.kb_id, error = %e, "direct-load probe failed, falling back to hybrid search"),
            }
        }

        let filter = target_filter(target);
        let mut results = hybrid_search(&self.engines, &filter, query, embedding, dim, vector_threshold, keyword_threshold, embedding_top_k).await;

        let trigger = embedding_top_k.max(1) / 2;
        if enable_query_expansion && results.len() < trigger.max(1) {
            let match_count = (2 * embedding_top_k).max(2 * rerank_top_k);
            let expanded = expansion_search(&self.engines, &filter, query, keyword_threshold, dim, match_count).await;
            results.extend(expanded);
        }

        results
    }

    /// The entity-graph join (spec §4.3), eligible only when the request
    /// carries pre-extracted entities and at least one graph-enabled KB.
    async fn run_graph_join(&self, ctx: &ChatContext) -> Result<(rag_core::model::chat_context::GraphResult, Vec<SearchResult>), AppError> {
        if ctx.entity.is_empty() || ctx.entity_kb_ids.is_empty() {
            return Ok((rag_core::model::chat_context::GraphResult::default(), Vec::new()));
        }

        let targets: Vec<GraphTarget> = ctx
            .entity_kb_ids
            .iter()
            .flat_map(|kb_id| match ctx.entity_knowledge.get(kb_id) {
                Some(knowledge_ids) if !knowledge_ids.is_empty() => knowledge_ids
                    .iter()
                    .map(|kid| GraphTarget { kb_id: kb_id.clone(), knowledge_id: Some(kid.clone()) })
                    .collect::<Vec<_>>(),
                _ => vec![GraphTarget { kb_id: kb_id.clone(), knowledge_id: None }],
            })
            .collect();

        graph::join(self.graph.as_ref(), self.chunks.as_ref(), &targets, &ctx.entity).await
    }
}

/// Builds the scoping filter for one target: KB-scoped targets filter by
/// `knowledge_base_ids` alone; `Knowledge`-scoped targets add the explicit
/// `knowledge_ids` filter on top (spec §4.3 step 2).
fn target_filter(target: &SearchTarget) -> RetrievalFilter {
    RetrievalFilter {
        knowledge_base_ids: vec![target.kb_id.clone()],
        knowledge_ids: if matches!(target.kind, TargetKind::Knowledge) { target.knowledge_ids.clone() } else { Vec::new() },
        ..Default::default()
    }
}

/// Invokes `Retrieve` on every capable registered engine, keyword and vector
/// in parallel; a failing engine contributes an empty result and is logged,
/// never aborting the whole fan-out (spec §7).
async fn hybrid_search(
    engines: &[Arc<dyn RetrievalEngine>],
    filter: &RetrievalFilter,
    query: &str,
    embedding: &[f32],
    dim: u32,
    vector_threshold: f32,
    keyword_threshold: f32,
    match_count: usize,
) -> Vec<SearchResult> {
    let mut jobs: Vec<BoxFuture<'static, Vec<SearchResult>>> = Vec::new();

    for engine in engines {
        let caps = engine.capabilities();

        if caps.keyword {
            let engine = Arc::clone(engine);
            let params = RetrieveParams {
                filter: filter.clone(),
                kind: StorageKind::Keyword,
                query_text: Some(query.to_string()),
                embedding: None,
                dimension: dim,
                vector_threshold,
                keyword_threshold,
                match_count,
            };
            jobs.push(Box::pin(async move {
                retrieve_logged(engine.as_ref(), &params, |e, err| {
                    tracing::warn!(engine = ?e.engine_type(), error = %err, "keyword retrieve failed");
                })
                .await
            }));
        }

        if caps.vector {
            let engine = Arc::clone(engine);
            let params = RetrieveParams {
                filter: filter.clone(),
                kind: StorageKind::Vector,
                query_text: None,
                embedding: Some(embedding.to_vec()),
                dimension: dim,
                vector_threshold,
                keyword_threshold,
                match_count,
            };
            jobs.push(Box::pin(async move {
                retrieve_logged(engine.as_ref(), &params, |e, err| {
                    tracing::warn!(engine = ?e.engine_type(), error = %err, "vector retrieve failed");
                })
                .await
            }));
        }
    }

    join_all(jobs).await.into_iter().flatten().collect()
}

async fn retrieve_logged(
    engine: &dyn RetrievalEngine,
    params: &RetrieveParams,
    on_error: impl FnOnce(&dyn RetrievalEngine, &rag_engine_core::error::EngineError),
) -> Vec<SearchResult> {
    match engine.retrieve(params).await {
        Ok(results) => results,
        Err(e) => {
            on_error(engine, &e);
            Vec::new()
        }
    }
}

/// The query-expansion retry: generates local variants, then retrieves each
/// keyword-only against every keyword-capable engine, bounded by a
/// semaphore of width 16 (spec §4.3 step 4, §5).
async fn expansion_search(
    engines: &[Arc<dyn RetrievalEngine>],
    filter: &RetrievalFilter,
    query: &str,
    keyword_threshold: f32,
    dim: u32,
    match_count: usize,
) -> Vec<SearchResult> {
    let variants = query_expansion::expand(query);
    if variants.is_empty() {
        return Vec::new();
    }

    let degraded_threshold = keyword_threshold * 0.8;
    let keyword_engines: Vec<Arc<dyn RetrievalEngine>> = engines.iter().filter(|e| e.capabilities().keyword).cloned().collect();

    let jobs: Vec<Box<dyn FnOnce() -> BoxFuture<'static, Vec<SearchResult>> + Send>> = variants
        .into_iter()
        .flat_map(|variant| {
            keyword_engines.iter().cloned().map(move |engine| {
                let variant = variant.clone();
                let filter = filter.clone();
                let job: Box<dyn FnOnce() -> BoxFuture<'static, Vec<SearchResult>> + Send> = Box::new(move || {
                    Box::pin(async move {
                        let params = RetrieveParams {
                            filter,
                            kind: StorageKind::Keyword,
                            query_text: Some(variant),
                            embedding: None,
                            dimension: dim,
                            vector_threshold: 0.0,
                            keyword_threshold: degraded_threshold,
                            match_count,
                        };
                        retrieve_logged(engine.as_ref(), &params, |e, err| {
                            tracing::warn!(engine = ?e.engine_type(), error = %err, "expansion retrieve failed");
                        })
                        .await
                    })
                });
                job
            })
        })
        .collect();

    bounded_fanout(jobs, EXPANSION_FANOUT_WIDTH).await.into_iter().flatten().collect()
}

/// History recall (spec §4.3 step 5): the first turn, walked newest-first,
/// whose cached `knowledge_references` are non-empty contributes them,
/// relabeled `match_type=history` regardless of how they were originally
/// matched.
fn history_recall(ctx: &ChatContext) -> Vec<SearchResult> {
    ctx.history
        .iter()
        .rev()
        .find(|turn| !turn.knowledge_references.is_empty())
        .map(|turn| {
            turn.knowledge_references
                .iter()
                .cloned()
                .map(|mut r| {
                    r.match_type = rag_core::model::MatchType::History;
                    r
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{history_recall, target_filter};
    use rag_core::model::chat_context::{ChatContext, HistoryTurn, SearchTarget, TargetKind};
    use rag_core::model::{ChunkType, MatchType, SearchResult};
    use std::collections::HashMap;

    fn result(id: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: "x".into(),
            score: 0.5,
            knowledge_id: "k1".into(),
            knowledge_title: "Doc".into(),
            chunk_index: 0,
            start_at: 0,
            end_at: 1,
            seq: 0,
            match_type: MatchType::Vector,
            sub_chunk_id: vec![],
            chunk_type: ChunkType::Text,
            parent_chunk_id: None,
            image_info: serde_json::Value::Null,
            metadata: HashMap::new(),
            chunk_metadata: vec![],
        }
    }

    #[test]
    fn kb_target_filter_has_no_knowledge_ids() {
        let target = SearchTarget { kb_id: "kb1".into(), kind: TargetKind::Kb, knowledge_ids: vec!["ignored".into()] };
        let filter = target_filter(&target);
        assert_eq!(filter.knowledge_base_ids, vec!["kb1".to_string()]);
        assert!(filter.knowledge_ids.is_empty());
    }

    #[test]
    fn knowledge_target_filter_includes_knowledge_ids() {
        let target = SearchTarget { kb_id: "kb1".into(), kind: TargetKind::Knowledge, knowledge_ids: vec!["a".into(), "b".into()] };
        let filter = target_filter(&target);
        assert_eq!(filter.knowledge_ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn history_recall_picks_newest_non_empty_turn_and_relabels() {
        let mut ctx = ChatContext::new("s1", "t1", "q");
        ctx.history = vec![
            HistoryTurn { turn_id: "old".into(), knowledge_references: vec![result("stale")] },
            HistoryTurn { turn_id: "empty".into(), knowledge_references: vec![] },
            HistoryTurn { turn_id: "recent".into(), knowledge_references: vec![result("fresh")] },
        ];
        let recalled = history_recall(&ctx);
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].id, "fresh");
        assert!(matches!(recalled[0].match_type, MatchType::History));
    }

    #[test]
    fn history_recall_empty_when_no_turn_has_references() {
        let ctx = ChatContext::new("s1", "t1", "q");
        assert!(history_recall(&ctx).is_empty());
    }
}
