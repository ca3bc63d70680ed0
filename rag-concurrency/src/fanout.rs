//! Bounded fan-out over a list of async jobs, capped by a counting
//! semaphore. Generalizes the coordinator's expansion fan-out (spec §4.3
//! step 4, "semaphore of width 16") and the reranker pool's checkout
//! (`retrieval-pipeline/src/reranking/mod.rs`) into one reusable helper so
//! every bounded-concurrency site in the workspace shares the same shape.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

/// Runs `jobs` concurrently, never more than `width` at a time, and returns
/// their results in the order the jobs complete (not submission order).
///
/// `width` is clamped to at least 1 so a misconfigured `0` degrades to fully
/// sequential execution rather than deadlocking.
pub async fn bounded_fanout<F, Fut, T>(jobs: Vec<F>, width: usize) -> Vec<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let mut futures = FuturesUnordered::new();

    for job in jobs {
        let permit = Arc::clone(&semaphore);
        futures.push(tokio::spawn(async move {
            let _permit = permit.acquire_owned().await;
            job().await
        }));
    }

    let mut out = Vec::new();
    while let Some(result) = futures.next().await {
        if let Ok(value) = result {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::bounded_fanout;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn runs_all_jobs_and_collects_results() {
        let jobs: Vec<_> = (0..10)
            .map(|i| {
                let job: Box<dyn FnOnce() -> _ + Send> = Box::new(move || async move { i * 2 });
                job
            })
            .collect();
        let results = bounded_fanout(jobs, 3).await;
        let mut sorted = results;
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_exceeds_width_concurrently() {
        let inflight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..20)
            .map(|_| {
                let inflight = Arc::clone(&inflight);
                let max_seen = Arc::clone(&max_seen);
                let job: Box<dyn FnOnce() -> _ + Send> = Box::new(move || async move {
                    let now = inflight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inflight.fetch_sub(1, Ordering::SeqCst);
                });
                job
            })
            .collect();

        bounded_fanout(jobs, 4).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn zero_width_clamps_to_one() {
        let results = bounded_fanout(
            vec![
                Box::new(|| async { 1 }) as Box<dyn FnOnce() -> _ + Send>,
                Box::new(|| async { 2 }) as Box<dyn FnOnce() -> _ + Send>,
            ],
            0,
        )
        .await;
        assert_eq!(results.iter().sum::<i32>(), 3);
    }
}
