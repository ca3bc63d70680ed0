//! Composite rerank scoring, MMR diversification, and the merge/stitch stage
//! (spec §4.4, §4.5): a `rag_core::collaborators::Reranker` pool built on
//! `rag_concurrency::WorkerPool`, the scoring and MMR math, and the merge
//! pass that turns reranked candidates into the final answer-ready set.

pub mod error;
pub mod merge;
pub mod mmr;
pub mod pool;
pub mod rerank;
pub mod scoring;

pub use error::RerankError;
pub use merge::merge;
pub use pool::RerankerPool;
pub use rerank::{rerank, score_direct_load, RERANK_DEGRADE_RETRIES};
