//! The pub/sub bus itself (spec §4.8): `On`/`Off`/`Emit`/`EmitAndWait`,
//! fan-out synchronous in registration order, handler errors (panics)
//! never propagated to the emitter.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use rag_core::model::{EventBusHandle, StreamEvent, StreamEventKind};
use tokio::sync::RwLock;

use crate::middleware::{compose, Middleware};

/// A subscriber callback: takes the event by value (so it may be moved into
/// a spawned task) and returns a future that resolves once the subscriber
/// has finished observing it.
pub type Handler = Arc<dyn Fn(StreamEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// One request's (or the process's) typed pub/sub bus.
///
/// Handlers are stored per [`StreamEventKind`] in registration order;
/// `emit` fans out to all handlers for the event's kind synchronously, in
/// that order, so a handler observing side effects of an earlier one (e.g.
/// the replay store appending before an SSE forwarder reads it back) can
/// rely on the ordering.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<StreamEventKind, Vec<Handler>>>,
    middlewares: RwLock<Vec<Middleware>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs middleware applied to every handler registered after this
    /// call (spec §9: composed at subscription time). Call before `on`.
    pub async fn use_middleware(&self, middleware: Middleware) {
        self.middlewares.write().await.push(middleware);
    }

    /// Registers `handler` for `kind`, wrapping it with whatever
    /// middlewares are currently installed.
    pub async fn on<F, Fut>(&self, kind: StreamEventKind, handler: F)
    where
        F: Fn(StreamEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let raw: Handler = Arc::new(move |event| Box::pin(handler(event)));
        let middlewares = self.middlewares.read().await;
        let wrapped = compose(raw, &middlewares);
        drop(middlewares);
        self.handlers.write().await.entry(kind).or_default().push(wrapped);
    }

    /// Removes every handler registered for `kind`.
    pub async fn off(&self, kind: StreamEventKind) {
        self.handlers.write().await.remove(&kind);
    }

    /// Fans `event` out to every handler for its kind, in registration
    /// order, awaiting each in turn. Handler panics are not this bus's
    /// concern directly. Install [`crate::middleware::with_recovery`] to
    /// guard against them; this method itself never returns an error.
    pub async fn emit(&self, event: StreamEvent) {
        let handlers = {
            let guard = self.handlers.read().await;
            guard.get(&event.kind).cloned().unwrap_or_default()
        };
        for handler in handlers {
            handler(event.clone()).await;
        }
    }

    /// Fans `event` out to every handler concurrently, waiting for all of
    /// them to finish (the `WaitGroup`-style semantics spec §4.8 calls
    /// `EmitAndWait`), rather than `emit`'s sequential await.
    pub async fn emit_and_wait(&self, event: StreamEvent) {
        let handlers = {
            let guard = self.handlers.read().await;
            guard.get(&event.kind).cloned().unwrap_or_default()
        };
        let tasks: Vec<_> = handlers.into_iter().map(|h| h(event.clone())).collect();
        futures::future::join_all(tasks).await;
    }
}

#[async_trait]
impl EventBusHandle for EventBus {
    async fn emit(&self, event: StreamEvent) {
        EventBus::emit(self, event).await;
    }
}

static GLOBAL_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// The process-wide bus kept only for observability subscribers (spec §9);
/// request-scoped traffic must go through a freshly built [`EventBus`]
/// instead, to avoid cross-session leakage.
#[must_use]
pub fn global_bus() -> Arc<EventBus> {
    Arc::clone(GLOBAL_BUS.get_or_init(EventBus::new))
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use rag_core::model::{StreamEvent, StreamEventKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fan_out_calls_every_handler_for_the_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            bus.on(StreamEventKind::Thought, move |_event| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        }

        bus.emit(StreamEvent::new("e1", StreamEventKind::Thought, "s1", "hi")).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn handlers_registered_for_other_kinds_are_not_invoked() {
        let bus = EventBus::new();
        let called = Arc::new(AtomicUsize::new(0));
        let called_clone = Arc::clone(&called);
        bus.on(StreamEventKind::Error, move |_event| {
            let called = Arc::clone(&called_clone);
            async move {
                called.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        bus.emit(StreamEvent::new("e1", StreamEventKind::Thought, "s1", "hi")).await;
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn off_removes_all_handlers_for_a_kind() {
        let bus = EventBus::new();
        let called = Arc::new(AtomicUsize::new(0));
        let called_clone = Arc::clone(&called);
        bus.on(StreamEventKind::Thought, move |_event| {
            let called = Arc::clone(&called_clone);
            async move {
                called.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        bus.off(StreamEventKind::Thought).await;
        bus.emit(StreamEvent::new("e1", StreamEventKind::Thought, "s1", "hi")).await;
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn emit_and_wait_runs_handlers_concurrently() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let count = Arc::clone(&count);
            bus.on(StreamEventKind::Complete, move |_event| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        }
        bus.emit_and_wait(StreamEvent::new("e1", StreamEventKind::Complete, "s1", "")).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }
}
