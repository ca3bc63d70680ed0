use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::stream_event::StreamEvent;

/// Key identifying one append-only replay log: `(session_id, message_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub session_id: String,
    pub message_id: String,
}

impl StreamKey {
    #[must_use]
    pub fn new(session_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message_id: message_id.into(),
        }
    }

    /// Redis key layout: `stream:events:<session_id>:<message_id>`.
    #[must_use]
    pub fn redis_key(&self, prefix: &str) -> String {
        format!("{prefix}:{}:{}", self.session_id, self.message_id)
    }
}

/// An ordered, TTL-bounded, offset-addressable log of events for one
/// `(session, message)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedStream {
    pub events: Vec<StreamEvent>,
}

impl PersistedStream {
    /// Everything from `from_offset` onward, plus the offset to resume a
    /// subsequent read from (`events.len()`).
    #[must_use]
    pub fn events_from(&self, from_offset: usize) -> (&[StreamEvent], usize) {
        let start = from_offset.min(self.events.len());
        (&self.events[start..], self.events.len())
    }
}

/// Collaborator trait for the append-only replay store; `rag-eventbus`
/// provides an in-memory and a Redis-backed implementation.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    /// Appends `event` to the log for `key`, stamping `timestamp` if it is
    /// zero, and refreshes the entry's TTL. O(1) amortized.
    async fn append_event(&self, key: &StreamKey, event: StreamEvent) -> Result<(), crate::error::AppError>;

    /// Returns every event at or after `from_offset`, and the offset a
    /// follow-up call should use to continue from where this one left off.
    async fn get_events(&self, key: &StreamKey, from_offset: usize) -> Result<(Vec<StreamEvent>, usize), crate::error::AppError>;
}

#[cfg(test)]
mod tests {
    use super::{PersistedStream, StreamKey};
    use crate::model::stream_event::{StreamEvent, StreamEventKind};

    #[test]
    fn redis_key_layout_matches_spec() {
        let key = StreamKey::new("sess1", "msg1");
        assert_eq!(key.redis_key("stream:events"), "stream:events:sess1:msg1");
    }

    #[test]
    fn events_from_offset_and_resume_point() {
        let mut log = PersistedStream::default();
        for i in 0..8 {
            log.events.push(StreamEvent::new(format!("e{i}"), StreamEventKind::Thought, "s1", "x"));
        }
        let (tail, next) = log.events_from(5);
        assert_eq!(tail.len(), 3);
        assert_eq!(next, 8);

        let (all, next_all) = log.events_from(0);
        assert_eq!(all.len(), 8);
        assert_eq!(next_all, 8);

        let (none, _) = log.events_from(8);
        assert!(none.is_empty());
    }
}
