//! Middleware chain for bus handlers, composed at subscription time (spec
//! §9: "Callbacks/middleware chains on the event bus are built as a linear
//! composition applied at subscription time, not at emit time"), the same
//! wrap-a-handler shape `html-router`'s axum middlewares use, generalized
//! off axum's `Next` onto a plain async closure since the bus has no HTTP
//! request/response to thread through.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use rag_core::model::StreamEvent;
use tracing::{debug, error, warn};

use crate::bus::Handler;

/// A middleware wraps one handler to produce another; applying `N`
/// middlewares to a handler at subscription time builds a single composed
/// closure that emit-time never has to re-traverse.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

fn boxed<F>(f: F) -> Handler
where
    F: Fn(StreamEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Logs every event the wrapped handler observes at `debug` level.
#[must_use]
pub fn with_logging() -> Middleware {
    Arc::new(|inner: Handler| {
        boxed(move |event: StreamEvent| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                debug!(id = %event.id, kind = ?event.kind, done = event.done, "event bus: dispatching");
                inner(event).await;
            })
        })
    })
}

/// Logs a warning if the wrapped handler takes longer than `threshold_ms`.
#[must_use]
pub fn with_timing(threshold_ms: u64) -> Middleware {
    Arc::new(move |inner: Handler| {
        boxed(move |event: StreamEvent| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                let id = event.id.clone();
                let started = Instant::now();
                inner(event).await;
                let elapsed = started.elapsed();
                if elapsed.as_millis() as u64 > threshold_ms {
                    warn!(id = %id, elapsed_ms = elapsed.as_millis(), "event bus: slow handler");
                }
            })
        })
    })
}

/// Catches a panic inside the wrapped handler so one faulty subscriber
/// can't take down the rest of the fan-out (spec §4.8: "handler errors
/// logged, not propagated").
#[must_use]
pub fn with_recovery() -> Middleware {
    Arc::new(|inner: Handler| {
        boxed(move |event: StreamEvent| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                let id = event.id.clone();
                let fut = std::panic::AssertUnwindSafe(inner(event));
                if let Err(panic) = futures::FutureExt::catch_unwind(fut).await {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(id = %id, panic = %message, "event bus: handler panicked");
                }
            })
        })
    })
}

/// Applies `middlewares` to `handler` in order, so the first middleware in
/// the list is the outermost wrapper (the first to see the event, the last
/// to return).
#[must_use]
pub fn compose(handler: Handler, middlewares: &[Middleware]) -> Handler {
    middlewares.iter().rev().fold(handler, |acc, mw| mw(acc))
}

#[cfg(test)]
mod tests {
    use super::{compose, with_logging, with_recovery, with_timing};
    use rag_core::model::{StreamEvent, StreamEventKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn composed_chain_still_calls_inner_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let inner: super::Handler = Arc::new(move |_event| {
            let calls = Arc::clone(&calls_clone);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        });

        let composed = compose(inner, &[with_logging(), with_timing(0), with_recovery()]);
        composed(StreamEvent::new("e1", StreamEventKind::Thought, "s1", "hi")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovery_middleware_survives_a_panicking_handler() {
        let inner: super::Handler = Arc::new(|_event| Box::pin(async move { panic!("boom") }));
        let composed = compose(inner, &[with_recovery()]);
        // Must not propagate the panic to the caller.
        composed(StreamEvent::new("e1", StreamEventKind::Thought, "s1", "hi")).await;
    }
}
