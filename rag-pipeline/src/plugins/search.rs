//! The search plugin (`EventKind::ChunkSearch`/`ChunkSearchParallel`): runs
//! the retrieval coordinator's full pass (direct-load, hybrid search, query
//! expansion, web search, history recall, entity-graph join, dedup, all
//! internal to `rag_coordinator::Coordinator::run`) and emits the
//! `SearchNothing` sentinel when nothing came back, per spec §4.1/§7.

use async_trait::async_trait;
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::AppError;
use rag_coordinator::Coordinator;

pub struct SearchPlugin {
    coordinator: Coordinator,
}

impl SearchPlugin {
    #[must_use]
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl crate::event_manager::Plugin for SearchPlugin {
    fn activation_events(&self) -> Vec<EventKind> {
        vec![EventKind::ChunkSearch, EventKind::ChunkSearchParallel]
    }

    async fn on_event(&self, kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError> {
        if matches!(kind, EventKind::ChunkSearchParallel) {
            return Ok(());
        }

        self.coordinator.run(ctx).await?;

        if ctx.search_result.is_empty() {
            return Err(AppError::SearchNothing);
        }

        Ok(())
    }
}
