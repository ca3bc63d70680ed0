//! In-memory replay store: a `DashMap`-backed append-only log per
//! `(session, message)` key, with a TTL enforced by sweeping expired
//! entries lazily on access (spec §4.8 "TTL default 24h").

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use rag_core::model::{PersistedStream, ReplayStore, StreamEvent, StreamKey};
use rag_core::AppError;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    log: PersistedStream,
    expires_at: Instant,
}

/// A process-local replay store, suitable for single-instance deployments
/// or tests; `RedisReplayStore` is the multi-instance-safe alternative.
pub struct InMemoryReplayStore {
    entries: DashMap<StreamKey, Entry>,
    ttl: Duration,
}

impl InMemoryReplayStore {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: DashMap::new(), ttl: DEFAULT_TTL }
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    fn is_expired(entry: &Entry) -> bool {
        Instant::now() >= entry.expires_at
    }
}

impl Default for InMemoryReplayStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayStore for InMemoryReplayStore {
    async fn append_event(&self, key: &StreamKey, mut event: StreamEvent) -> Result<(), AppError> {
        if event.timestamp == 0 {
            event.timestamp = chrono::Utc::now().timestamp_millis();
        }

        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            log: PersistedStream::default(),
            expires_at: Instant::now() + self.ttl,
        });
        if Self::is_expired(&entry) {
            entry.log = PersistedStream::default();
        }
        entry.log.events.push(event);
        entry.expires_at = Instant::now() + self.ttl;
        Ok(())
    }

    async fn get_events(&self, key: &StreamKey, from_offset: usize) -> Result<(Vec<StreamEvent>, usize), AppError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok((Vec::new(), 0));
        };
        if Self::is_expired(&entry) {
            return Ok((Vec::new(), 0));
        }
        let (tail, next) = entry.log.events_from(from_offset);
        Ok((tail.to_vec(), next))
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryReplayStore;
    use rag_core::model::{ReplayStore, StreamEvent, StreamEventKind, StreamKey};
    use std::time::Duration;

    #[tokio::test]
    async fn append_then_get_from_zero_returns_everything() {
        let store = InMemoryReplayStore::new();
        let key = StreamKey::new("s1", "m1");
        for i in 0..3 {
            store
                .append_event(&key, StreamEvent::new(format!("e{i}"), StreamEventKind::Thought, "s1", "x"))
                .await
                .unwrap();
        }
        let (events, next) = store.get_events(&key, 0).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(next, 3);
    }

    #[tokio::test]
    async fn get_events_past_the_end_is_empty() {
        let store = InMemoryReplayStore::new();
        let key = StreamKey::new("s1", "m1");
        store
            .append_event(&key, StreamEvent::new("e0", StreamEventKind::Thought, "s1", "x"))
            .await
            .unwrap();
        let (events, _) = store.get_events(&key, 5).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn unknown_key_returns_empty_without_error() {
        let store = InMemoryReplayStore::new();
        let key = StreamKey::new("nope", "nope");
        let (events, next) = store.get_events(&key, 0).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(next, 0);
    }

    #[tokio::test]
    async fn expired_entries_read_as_empty() {
        let store = InMemoryReplayStore::with_ttl(Duration::from_millis(1));
        let key = StreamKey::new("s1", "m1");
        store
            .append_event(&key, StreamEvent::new("e0", StreamEventKind::Thought, "s1", "x"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (events, _) = store.get_events(&key, 0).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn timestamp_is_stamped_when_unset() {
        let store = InMemoryReplayStore::new();
        let key = StreamKey::new("s1", "m1");
        store
            .append_event(&key, StreamEvent::new("e0", StreamEventKind::Thought, "s1", "x"))
            .await
            .unwrap();
        let (events, _) = store.get_events(&key, 0).await.unwrap();
        assert!(events[0].timestamp > 0);
    }
}
