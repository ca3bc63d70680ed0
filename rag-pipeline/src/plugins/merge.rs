//! The merge plugin (`EventKind::ChunkMerge`): delegates to
//! `rag_rerank::merge` to stitch, FAQ-enrich, and neighbor-expand the
//! reranked candidates (spec §4.5).

use std::sync::Arc;

use async_trait::async_trait;
use rag_core::collaborators::ChunkRepository;
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::AppError;

pub struct MergePlugin {
    chunks: Arc<dyn ChunkRepository>,
}

impl MergePlugin {
    #[must_use]
    pub fn new(chunks: Arc<dyn ChunkRepository>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl crate::event_manager::Plugin for MergePlugin {
    fn activation_events(&self) -> Vec<EventKind> {
        vec![EventKind::ChunkMerge]
    }

    async fn on_event(&self, _kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError> {
        ctx.merge_result = rag_rerank::merge(self.chunks.as_ref(), ctx.rerank_result.clone()).await?;
        Ok(())
    }
}
