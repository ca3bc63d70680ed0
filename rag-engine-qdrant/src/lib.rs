//! Qdrant `RetrievalEngine` implementation with dimension-sharded
//! collections (spec §4.2, §6).
//!
//! One physical collection per embedding dimension (`"<base>_<dim>"`),
//! created lazily and idempotently under race via
//! `rag_engine_core::ShardRegistry`'s double-checked locking. Keyword search
//! has no server-side scoring (Qdrant is a vector store first), so it is
//! emulated client-side: the query is tokenized (Jieba for CJK, falling
//! back to whitespace), each token becomes a `should` match against the
//! payload's content text index, and every hit is assigned a uniform score
//! of `1.0` (spec §4.2 "Qdrant keyword query").

mod engine;
mod payload;
mod tokenizer;

pub use engine::QdrantEngine;
pub use tokenizer::tokenize_for_search;
