//! A small pool of cloneable resources checked out under a semaphore,
//! generalizing `retrieval-pipeline/src/reranking/mod.rs`'s `RerankerPool`
//! (a fixed set of loaded cross-encoder engines shared across concurrent
//! requests) into a reusable shape any bounded-resource pool in this
//! workspace can build on (the reranker pool in `rag-rerank` is built
//! directly on top of this).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A fixed-size pool of `T` instances, dispensed round-robin and
/// backpressured by a semaphore sized to the pool.
pub struct WorkerPool<T> {
    workers: Vec<Arc<T>>,
    semaphore: Arc<Semaphore>,
    next: AtomicUsize,
}

/// An active checkout; the semaphore permit is released when this drops.
pub struct Lease<T> {
    worker: Arc<T>,
    _permit: OwnedSemaphorePermit,
}

impl<T> std::ops::Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.worker
    }
}

impl<T> WorkerPool<T> {
    /// Builds a pool of `workers.len()` instances; panics only on an empty
    /// vec, mirroring `RerankerPool::new`'s "pool_size must be > 0" check.
    #[must_use]
    pub fn new(workers: Vec<T>) -> Self {
        assert!(!workers.is_empty(), "WorkerPool requires at least one worker");
        let size = workers.len();
        Self {
            workers: workers.into_iter().map(Arc::new).collect(),
            semaphore: Arc::new(Semaphore::new(size)),
            next: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Acquires a permit (blocking if the pool is fully checked out) and
    /// hands back a round-robin-selected worker.
    ///
    /// # Panics
    /// Never under normal operation; the semaphore is only ever closed by
    /// dropping the pool itself, which cannot happen while `self` is
    /// borrowed here.
    pub async fn checkout(self: &Arc<Self>) -> Lease<T> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("WorkerPool semaphore closed unexpectedly");
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        Lease {
            worker: Arc::clone(&self.workers[idx]),
            _permit: permit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerPool;
    use std::sync::Arc;

    #[tokio::test]
    async fn round_robins_across_workers() {
        let pool = Arc::new(WorkerPool::new(vec!["a", "b", "c"]));
        let mut seen = Vec::new();
        for _ in 0..6 {
            let lease = pool.checkout().await;
            seen.push(*lease);
        }
        assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[tokio::test]
    #[should_panic(expected = "at least one worker")]
    async fn empty_pool_panics() {
        let _pool: WorkerPool<i32> = WorkerPool::new(vec![]);
    }
}
