//! Small reusable concurrency primitives shared by the coordinator, rerank,
//! and pipeline crates (spec §5): a semaphore-bounded fan-out helper and a
//! scoped-cancellation wrapper, generalized from the ad hoc
//! `FuturesUnordered` + `Semaphore` usage in
//! `retrieval-pipeline/src/pipeline/stages/mod.rs` and
//! `retrieval-pipeline/src/reranking/mod.rs`.

pub mod cancellation;
pub mod fanout;
pub mod worker_pool;

pub use cancellation::ScopedCancellation;
pub use fanout::bounded_fanout;
pub use worker_pool::{Lease, WorkerPool};
