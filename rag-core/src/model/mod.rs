pub mod chat_context;
pub mod index_entry;
pub mod replay;
pub mod search_result;
pub mod stream_event;

pub use chat_context::{ChatContext, Entity, EventKind, GraphResult, HistoryTurn, SearchTarget, TargetKind};
pub use index_entry::IndexEntry;
pub use replay::{PersistedStream, ReplayStore, StreamKey};
pub use search_result::{ChunkType, MatchType, SearchResult};
pub use stream_event::{EventBusHandle, StreamEvent, StreamEventKind};
