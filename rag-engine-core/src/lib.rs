//! The uniform `RetrievalEngine` contract, shared filter semantics,
//! dimension-sharding helpers, and the storage-estimation cost model
//! (spec §4.2), implemented per backend by `rag-engine-postgres`,
//! `rag-engine-qdrant`, and `rag-engine-elasticsearch`.

pub mod dimension;
pub mod engine;
pub mod error;
pub mod filter;
pub mod storage_estimate;

pub use dimension::{sharded_name, ShardRegistry};
pub use engine::{
    expanded_top_k, rewrite_source_id, Capabilities, CopyIndicesRequest, DeleteIdKind, DeleteRequest, EngineType,
    RetrievalEngine, RetrieveParams, StorageKind, DEFAULT_COPY_BATCH_SIZE,
};
pub use error::EngineError;
pub use filter::{RetrievalFilter, Scope};
pub use storage_estimate::{estimate_entry_bytes, estimate_storage_size};
