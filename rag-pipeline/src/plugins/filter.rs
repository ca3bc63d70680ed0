//! The filter plugin (`EventKind::FilterTopK`, spec §4.6): truncates
//! whichever of `{merge_result, rerank_result, search_result}` is non-empty,
//! in that preference order, to `rerank_top_k`, writing the winner back into
//! the same accumulator it came from.

use async_trait::async_trait;
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::AppError;

pub struct FilterPlugin;

#[async_trait]
impl crate::event_manager::Plugin for FilterPlugin {
    fn activation_events(&self) -> Vec<EventKind> {
        vec![EventKind::FilterTopK]
    }

    async fn on_event(&self, _kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError> {
        let top_k = ctx.rerank_top_k.max(1);

        if !ctx.merge_result.is_empty() {
            ctx.merge_result.truncate(top_k);
        } else if !ctx.rerank_result.is_empty() {
            ctx.rerank_result.truncate(top_k);
        } else {
            ctx.search_result.truncate(top_k);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FilterPlugin;
    use crate::event_manager::Plugin;
    use rag_core::model::chat_context::{ChatContext, EventKind};
    use rag_core::model::{ChunkType, MatchType, SearchResult};
    use std::collections::HashMap;

    fn candidate(id: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: "c".into(),
            score: 0.5,
            knowledge_id: "k".into(),
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

    #[tokio::test]
    async fn truncates_merge_result_when_present() {
        let plugin = FilterPlugin;
        let mut ctx = ChatContext::new("s1", "t1", "q");
        ctx.rerank_top_k = 2;
        ctx.merge_result = vec![candidate("a"), candidate("b"), candidate("c")];
        ctx.rerank_result = vec![candidate("x")];
        plugin.on_event(EventKind::FilterTopK, &mut ctx).await.unwrap();
        assert_eq!(ctx.merge_result.len(), 2);
        assert_eq!(ctx.rerank_result.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_search_result_when_others_empty() {
        let plugin = FilterPlugin;
        let mut ctx = ChatContext::new("s1", "t1", "q");
        ctx.rerank_top_k = 1;
        ctx.search_result = vec![candidate("a"), candidate("b")];
        plugin.on_event(EventKind::FilterTopK, &mut ctx).await.unwrap();
        assert_eq!(ctx.search_result.len(), 1);
    }
}
