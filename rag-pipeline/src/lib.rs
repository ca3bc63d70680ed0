//! The event manager & plugin chain (spec §4.1), wired to the concrete
//! plugins (rewrite/search/rerank/merge/filter/stream) that drive one
//! request through `REWRITE → PARALLEL_SEARCH → RERANK → MERGE → FILTER →
//! STREAM` (spec §2).

pub mod event_manager;
pub mod plugins;

use std::sync::Arc;

use rag_core::collaborators::{ChatModel, ChunkRepository, Reranker};
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::AppError;
use rag_coordinator::Coordinator;

pub use event_manager::{EventManager, Plugin, StageTimings};
pub use plugins::{FilterPlugin, MergePlugin, RerankPlugin, RewritePlugin, SearchPlugin, StreamingPlugin};

/// Wires the standard plugin set (spec §4.1's full stage list) against an
/// `EventManager`. `reranker` may be `None`, in which case the rerank stage
/// degrades gracefully to pre-rerank ordering (SPEC_FULL §C.4).
#[must_use]
pub fn build_manager(
    chat_model: Arc<dyn ChatModel>,
    coordinator: Coordinator,
    reranker: Option<Arc<dyn Reranker>>,
    chunks: Arc<dyn ChunkRepository>,
) -> EventManager {
    let mut manager = EventManager::new();
    manager.register(Arc::new(RewritePlugin::new(Arc::clone(&chat_model))));
    manager.register(Arc::new(SearchPlugin::new(coordinator)));
    manager.register(Arc::new(RerankPlugin::new(reranker, Arc::clone(&chunks))));
    manager.register(Arc::new(MergePlugin::new(chunks)));
    manager.register(Arc::new(FilterPlugin));
    manager.register(Arc::new(StreamingPlugin::new(chat_model)));
    manager
}

/// Drives one request through the fixed stage order spec §2 describes.
/// `EventKind::StreamFilter` is dispatched for symmetry with spec §6's
/// event-kind list but has no plugin of its own. The no-match filter is
/// installed inline by the streaming plugin around `ChatCompletionStream`,
/// since it needs to wrap the bus handle the streaming call is about to use
/// rather than run as a separate, later stage.
pub struct Pipeline {
    manager: EventManager,
}

impl Pipeline {
    #[must_use]
    pub fn new(manager: EventManager) -> Self {
        Self { manager }
    }

    /// Runs the full chain, honoring the `SearchNothing` sentinel (spec §7):
    /// rerank/merge are skipped, but filter and stream still run against
    /// whatever was left in the context (i.e. nothing).
    pub async fn run(&self, ctx: &mut ChatContext) -> Result<StageTimings, AppError> {
        let mut timings = StageTimings::default();

        self.manager.dispatch_timed(EventKind::RewriteQuery, ctx, &mut timings).await?;

        let search_nothing = match self.manager.dispatch_timed(EventKind::ChunkSearch, ctx, &mut timings).await {
            Ok(()) => false,
            Err(AppError::SearchNothing) => {
                tracing::info!("search produced no candidates; skipping rerank/merge, continuing to filter/stream");
                true
            }
            Err(e) => return Err(e),
        };

        if !search_nothing {
            self.manager.dispatch_timed(EventKind::ChunkRerank, ctx, &mut timings).await?;
            self.manager.dispatch_timed(EventKind::ChunkMerge, ctx, &mut timings).await?;
        }

        self.manager.dispatch_timed(EventKind::FilterTopK, ctx, &mut timings).await?;
        self.manager.dispatch_timed(EventKind::ChatCompletionStream, ctx, &mut timings).await?;
        self.manager.dispatch_timed(EventKind::StreamFilter, ctx, &mut timings).await?;

        Ok(timings)
    }
}
