//! The rerank plugin (`EventKind::ChunkRerank`): splits the coordinator's
//! candidates into direct-load bypass and rerank-eligible sets, scores each
//! through `rag_rerank`, and writes `ctx.rerank_result` (spec §4.4).
//!
//! Graceful degradation (SPEC_FULL §C.4): if no reranker is configured, or
//! the reranker call fails, the stage falls back to the pre-rerank ordering
//! (composite-scored but not MMR-diversified) rather than aborting the
//! chain.

use std::sync::Arc;

use async_trait::async_trait;
use rag_core::collaborators::{ChunkRepository, Reranker};
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::model::{MatchType, SearchResult};
use rag_core::AppError;

pub struct RerankPlugin {
    reranker: Option<Arc<dyn Reranker>>,
    chunks: Arc<dyn ChunkRepository>,
}

impl RerankPlugin {
    #[must_use]
    pub fn new(reranker: Option<Arc<dyn Reranker>>, chunks: Arc<dyn ChunkRepository>) -> Self {
        Self { reranker, chunks }
    }
}

fn partition_direct_load(results: Vec<SearchResult>) -> (Vec<SearchResult>, Vec<SearchResult>) {
    results.into_iter().partition(|r| matches!(r.match_type, MatchType::DirectLoad))
}

#[async_trait]
impl crate::event_manager::Plugin for RerankPlugin {
    fn activation_events(&self) -> Vec<EventKind> {
        vec![EventKind::ChunkRerank]
    }

    async fn on_event(&self, _kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError> {
        let candidates = std::mem::take(&mut ctx.search_result);
        let (direct_load, rerank_candidates) = partition_direct_load(candidates);

        let mut results = rag_rerank::score_direct_load(direct_load);

        match &self.reranker {
            Some(reranker) if !rerank_candidates.is_empty() => {
                let query = ctx.effective_query().to_string();
                match rag_rerank::rerank(
                    reranker.as_ref(),
                    self.chunks.as_ref(),
                    &query,
                    rerank_candidates.clone(),
                    ctx.rerank_threshold,
                    ctx.rerank_top_k,
                )
                .await
                {
                    Ok((selected, redundancy)) => {
                        tracing::debug!(selected = selected.len(), redundancy, "rerank stage selected candidates");
                        results.extend(selected);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reranker call failed, falling back to pre-rerank ordering");
                        results.extend(rag_rerank::score_direct_load(rerank_candidates));
                    }
                }
            }
            Some(_) => {}
            None => {
                tracing::debug!("no reranker configured, falling back to pre-rerank ordering");
                results.extend(rag_rerank::score_direct_load(rerank_candidates));
            }
        }

        ctx.rerank_result = results;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RerankPlugin;
    use crate::event_manager::Plugin;
    use rag_core::model::chat_context::{ChatContext, EventKind};
    use rag_core::model::{ChunkType, MatchType, SearchResult};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NoopChunks;

    #[async_trait::async_trait]
    impl rag_core::collaborators::ChunkRepository for NoopChunks {
        async fn get_chunk(&self, _chunk_id: &str) -> Result<Option<rag_core::collaborators::ChunkRow>, rag_core::AppError> {
            Ok(None)
        }
        async fn get_neighbor(
            &self,
            _chunk_id: &str,
            _direction: rag_core::collaborators::NeighborDirection,
        ) -> Result<Option<rag_core::collaborators::ChunkRow>, rag_core::AppError> {
            Ok(None)
        }
        async fn list_chunks_by_knowledge_ids(&self, _ids: &[String]) -> Result<Vec<rag_core::collaborators::ChunkRow>, rag_core::AppError> {
            Ok(Vec::new())
        }
        async fn count_chunks(&self, _ids: &[String]) -> Result<u64, rag_core::AppError> {
            Ok(0)
        }
        async fn get_faq_metadata(&self, _chunk_id: &str) -> Result<Option<rag_core::collaborators::FaqMetadata>, rag_core::AppError> {
            Ok(None)
        }
        async fn get_generated_questions(&self, _chunk_id: &str) -> Result<Vec<String>, rag_core::AppError> {
            Ok(Vec::new())
        }
    }

    fn candidate(id: &str, match_type: MatchType) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: "content".into(),
            score: 0.7,
            knowledge_id: "k1".into(),
            knowledge_title: "Doc".into(),
            chunk_index: 0,
            start_at: 0,
            end_at: 7,
            seq: 0,
            match_type,
            sub_chunk_id: vec![],
            chunk_type: ChunkType::Text,
            parent_chunk_id: None,
            image_info: serde_json::Value::Null,
            metadata: HashMap::new(),
            chunk_metadata: vec![],
        }
    }

    #[tokio::test]
    async fn falls_back_to_pre_rerank_ordering_without_a_reranker() {
        let plugin = RerankPlugin::new(None, Arc::new(NoopChunks));
        let mut ctx = ChatContext::new("s1", "t1", "q");
        ctx.search_result = vec![candidate("a", MatchType::Vector), candidate("b", MatchType::DirectLoad)];
        plugin.on_event(EventKind::ChunkRerank, &mut ctx).await.unwrap();
        assert_eq!(ctx.rerank_result.len(), 2);
        assert!(ctx.rerank_result.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }
}
