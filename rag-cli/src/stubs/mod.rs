//! Hand-written in-process collaborators standing in for the real
//! chat/embedding/storage/graph backends (SPEC_FULL §A "does not implement
//! HTTP routing, auth, or tenant CRUD", this crate only wires the pipeline
//! together for local exercising).

pub mod chat_model;
pub mod embedder;
pub mod engine;
pub mod repository;
pub mod seed;

pub use chat_model::CannedChatModel;
pub use embedder::HashedEmbedder;
pub use engine::InMemoryEngine;
pub use repository::{InMemoryChunkRepository, InMemoryGraphRepository, InMemoryKnowledgeRepository};
