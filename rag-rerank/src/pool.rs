//! Reranker engine pool (SPEC_FULL §C.1), generalizing
//! `retrieval-pipeline/src/reranking/mod.rs`'s `RerankerPool`/`RerankerLease`
//! onto `rag_concurrency::WorkerPool`: a fixed set of loaded cross-encoder
//! engines, checked out round-robin under a semaphore so concurrent requests
//! backpressure instead of racing each other's `&mut TextRerank`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{RerankInitOptions, TextRerank};
use rag_concurrency::WorkerPool;
use rag_core::collaborators::{RerankScore, Reranker};
use rag_core::AppError;
use tokio::sync::Mutex;
use tracing::debug;

/// A pool of loaded `TextRerank` engines, implementing [`Reranker`] by
/// checking one out per call.
pub struct RerankerPool {
    pool: Arc<WorkerPool<Mutex<TextRerank>>>,
}

impl RerankerPool {
    /// Loads `pool_size` independent engines into `cache_dir`. `pool_size`
    /// must be greater than zero.
    pub fn new(pool_size: usize, cache_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        if pool_size == 0 {
            return Err(AppError::InvalidParams("reranker pool size must be greater than zero".to_string()));
        }

        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;

        let mut init_options = RerankInitOptions::default();
        init_options.cache_dir = cache_dir;

        let mut workers = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            debug!(worker = i, "loading reranker engine");
            let engine = TextRerank::try_new(init_options.clone()).map_err(|e| AppError::GetRerankModel(e.to_string()))?;
            workers.push(Mutex::new(engine));
        }

        Ok(Self { pool: Arc::new(WorkerPool::new(workers)) })
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }
}

#[async_trait]
impl Reranker for RerankerPool {
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<RerankScore>, AppError> {
        let lease = self.pool.checkout().await;
        let mut engine = lease.lock().await;
        let results = engine
            .rerank(query.to_string(), passages.to_vec(), false, None)
            .map_err(|e| AppError::GetRerankModel(e.to_string()))?;
        Ok(results.into_iter().map(|r| RerankScore { index: r.index, relevance: r.score }).collect())
    }
}
