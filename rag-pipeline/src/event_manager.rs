//! The event manager & plugin chain (spec §4.1): plugins register for the
//! `EventKind`s they handle; `dispatch` walks the ordered list for a kind in
//! registration order, stopping on the first error except the
//! `SearchNothing` sentinel, which passes through unwrapped as a non-fatal
//! short-circuit for the filter/stream stages to observe (spec §7).
//!
//! Generalizes `retrieval-pipeline/src/pipeline/mod.rs`'s
//! `PipelineStage`/`StrategyDriver`/`PipelineStageTimings` shape, a
//! sequential `Vec` of stages run in order with per-stage timing recorded
//! around each `execute` call, onto a kind-keyed registry so the same
//! dispatcher serves every stage spec §4.1 names, rather than one fixed
//! driver-specific stage list.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rag_core::error::PluginError;
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::AppError;

/// A single pipeline stage. `activation_events` declares which `EventKind`s
/// it should be registered for; `on_event` performs the stage's work against
/// the shared `ChatContext`.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn activation_events(&self) -> Vec<EventKind>;

    async fn on_event(&self, kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError>;
}

/// Per-stage elapsed time, recorded around each `dispatch_timed` call.
#[derive(Debug, Default, Clone)]
pub struct StageTimings {
    timings: Vec<(EventKind, Duration)>,
}

impl StageTimings {
    pub fn record(&mut self, kind: EventKind, duration: Duration) {
        self.timings.push((kind, duration));
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<(EventKind, Duration)> {
        self.timings
    }

    #[must_use]
    pub fn ms_for(&self, kind: EventKind) -> u128 {
        self.timings.iter().find(|(k, _)| *k == kind).map(|(_, d)| d.as_millis()).unwrap_or(0)
    }
}

/// Holds the ordered, per-kind plugin registry and dispatches requests
/// through it.
#[derive(Default)]
pub struct EventManager {
    plugins: HashMap<EventKind, Vec<Arc<dyn Plugin>>>,
}

impl EventManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `plugin` for every `EventKind` it declares activation
    /// interest in. Registration order is stable (spec §4.1): register
    /// tracing/observability plugins first so their spans enclose the rest.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        for kind in plugin.activation_events() {
            self.plugins.entry(kind).or_default().push(Arc::clone(&plugin));
        }
    }

    /// Walks the plugins registered for `kind` in order, short-circuiting on
    /// the first error. Non-sentinel errors are wrapped in `PluginError` to
    /// record which kind failed; the `SearchNothing` sentinel is passed
    /// through unwrapped so callers can `matches!(e, AppError::SearchNothing)`.
    pub async fn dispatch(&self, kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError> {
        let Some(plugins) = self.plugins.get(&kind) else { return Ok(()) };
        for plugin in plugins {
            if let Err(e) = plugin.on_event(kind, ctx).await {
                if matches!(e, AppError::SearchNothing) {
                    tracing::debug!(?kind, "search produced no candidates, short-circuiting");
                    return Err(e);
                }
                return Err(PluginError::new(kind, e).into());
            }
        }
        Ok(())
    }

    /// `dispatch`, recording elapsed wall time into `timings` regardless of
    /// outcome (SPEC_FULL §C.2 stage-timing diagnostics).
    pub async fn dispatch_timed(&self, kind: EventKind, ctx: &mut ChatContext, timings: &mut StageTimings) -> Result<(), AppError> {
        let start = Instant::now();
        let result = self.dispatch(kind, ctx).await;
        timings.record(kind, start.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{EventManager, Plugin, StageTimings};
    use async_trait::async_trait;
    use rag_core::model::chat_context::{ChatContext, EventKind};
    use rag_core::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingPlugin {
        kind: EventKind,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn activation_events(&self) -> Vec<EventKind> {
            vec![self.kind]
        }

        async fn on_event(&self, _kind: EventKind, _ctx: &mut ChatContext) -> Result<(), AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingPlugin;

    #[async_trait]
    impl Plugin for FailingPlugin {
        fn activation_events(&self) -> Vec<EventKind> {
            vec![EventKind::ChunkSearch]
        }

        async fn on_event(&self, _kind: EventKind, _ctx: &mut ChatContext) -> Result<(), AppError> {
            Err(AppError::SearchNothing)
        }
    }

    #[tokio::test]
    async fn dispatch_runs_registered_plugins_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut manager = EventManager::new();
        manager.register(Arc::new(CountingPlugin { kind: EventKind::RewriteQuery, calls: Arc::clone(&calls) }));
        manager.register(Arc::new(CountingPlugin { kind: EventKind::RewriteQuery, calls: Arc::clone(&calls) }));

        let mut ctx = ChatContext::new("s1", "t1", "q");
        manager.dispatch(EventKind::RewriteQuery, &mut ctx).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dispatch_passes_search_nothing_through_unwrapped() {
        let mut manager = EventManager::new();
        manager.register(Arc::new(FailingPlugin));
        let mut ctx = ChatContext::new("s1", "t1", "q");
        let err = manager.dispatch(EventKind::ChunkSearch, &mut ctx).await.unwrap_err();
        assert!(matches!(err, AppError::SearchNothing));
    }

    #[tokio::test]
    async fn dispatch_on_unregistered_kind_is_a_no_op() {
        let manager = EventManager::new();
        let mut ctx = ChatContext::new("s1", "t1", "q");
        manager.dispatch(EventKind::ChunkMerge, &mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_timed_records_elapsed_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut manager = EventManager::new();
        manager.register(Arc::new(CountingPlugin { kind: EventKind::FilterTopK, calls }));
        let mut ctx = ChatContext::new("s1", "t1", "q");
        let mut timings = StageTimings::default();
        manager.dispatch_timed(EventKind::FilterTopK, &mut ctx, &mut timings).await.unwrap();
        assert_eq!(timings.into_vec().len(), 1);
    }
}
