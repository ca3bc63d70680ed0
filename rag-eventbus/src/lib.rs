//! Typed pub/sub event bus and the SSE replay store (spec §4.8).
//!
//! A dedicated [`bus::EventBus`] is built per request so `SessionID`
//! filtering bugs can't leak handlers across sessions (spec §9); a
//! process-global bus ([`bus::global_bus`]) exists only for observability
//! subscribers. The replay store has an in-memory and a Redis-backed
//! implementation of `rag_core::model::ReplayStore`.

pub mod bus;
pub mod error;
pub mod middleware;
pub mod replay_memory;
pub mod replay_redis;

pub use bus::{global_bus, EventBus, Handler};
pub use error::EventBusError;
pub use middleware::{with_logging, with_recovery, with_timing, Middleware};
pub use replay_memory::InMemoryReplayStore;
pub use replay_redis::RedisReplayStore;
