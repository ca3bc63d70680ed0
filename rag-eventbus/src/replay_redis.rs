//! Redis-backed replay store: `RPUSH`/`LRANGE` against the
//! `stream:events:<session_id>:<message_id>` key layout (spec §6), with the
//! TTL refreshed via `EXPIRE` on every append.

use async_trait::async_trait;
use rag_core::model::{ReplayStore, StreamEvent, StreamKey};
use rag_core::AppError;
use redis::AsyncCommands;

const DEFAULT_PREFIX: &str = "stream:events";
const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;

/// A Redis-backed replay store, safe to share across instances of the
/// service (unlike [`crate::InMemoryReplayStore`]).
pub struct RedisReplayStore {
    client: redis::Client,
    prefix: String,
    ttl_secs: i64,
}

impl RedisReplayStore {
    #[must_use]
    pub fn new(client: redis::Client) -> Self {
        Self { client, prefix: DEFAULT_PREFIX.to_string(), ttl_secs: DEFAULT_TTL_SECS }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::InternalError(format!("redis connect: {e}")))
    }
}

#[async_trait]
impl ReplayStore for RedisReplayStore {
    async fn append_event(&self, key: &StreamKey, mut event: StreamEvent) -> Result<(), AppError> {
        if event.timestamp == 0 {
            event.timestamp = chrono::Utc::now().timestamp_millis();
        }
        let payload = serde_json::to_string(&event).map_err(AppError::from)?;
        let redis_key = key.redis_key(&self.prefix);

        let mut conn = self.connection().await?;
        let _: i64 = conn
            .rpush(&redis_key, payload)
            .await
            .map_err(|e| AppError::InternalError(format!("redis rpush: {e}")))?;
        let _: bool = conn
            .expire(&redis_key, self.ttl_secs)
            .await
            .map_err(|e| AppError::InternalError(format!("redis expire: {e}")))?;
        Ok(())
    }

    async fn get_events(&self, key: &StreamKey, from_offset: usize) -> Result<(Vec<StreamEvent>, usize), AppError> {
        let redis_key = key.redis_key(&self.prefix);
        let mut conn = self.connection().await?;

        let start = i64::try_from(from_offset).unwrap_or(i64::MAX);
        let raw: Vec<String> = conn
            .lrange(&redis_key, start, -1)
            .await
            .map_err(|e| AppError::InternalError(format!("redis lrange: {e}")))?;

        let total_len: usize = conn
            .llen::<_, i64>(&redis_key)
            .await
            .map_err(|e| AppError::InternalError(format!("redis llen: {e}")))
            .and_then(|n| usize::try_from(n).map_err(|e| AppError::InternalError(e.to_string())))?;

        let events = raw
            .into_iter()
            .map(|s| serde_json::from_str(&s).map_err(AppError::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((events, total_len))
    }
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_PREFIX;
    use rag_core::model::StreamKey;

    #[test]
    fn default_prefix_matches_spec_key_layout() {
        let key = StreamKey::new("sess1", "msg1");
        assert_eq!(key.redis_key(DEFAULT_PREFIX), "stream:events:sess1:msg1");
    }
}
