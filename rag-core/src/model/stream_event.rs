use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Wire-level event kind strings, exactly as external subscribers (SSE
/// clients) see them on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    #[serde(rename = "agent.thought")]
    Thought,
    #[serde(rename = "agent.tool_call")]
    ToolCall,
    #[serde(rename = "agent.tool_result")]
    ToolResult,
    #[serde(rename = "agent.references")]
    References,
    #[serde(rename = "agent.final_answer")]
    FinalAnswer,
    #[serde(rename = "agent.reflection")]
    Reflection,
    #[serde(rename = "session.title")]
    Title,
    #[serde(rename = "agent.complete")]
    Complete,
    #[serde(rename = "error")]
    Error,
}

/// A single chunk on the event bus.
///
/// `content` is the chunk itself, never the running accumulation; within a
/// single `id` chunks arrive FIFO and the last one has `done = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    pub session_id: String,
    pub done: bool,
    pub content: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Unix millis; `0` is treated as "unset" and is stamped on append by
    /// the replay store.
    pub timestamp: i64,
}

impl StreamEvent {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: StreamEventKind, session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            session_id: session_id.into(),
            done: false,
            content: content.into(),
            data: serde_json::Value::Null,
            timestamp: 0,
        }
    }

    #[must_use]
    pub fn done(mut self) -> Self {
        self.done = true;
        self
    }
}

/// The handle a [`crate::model::chat_context::ChatContext`] carries to its
/// per-request event bus. Kept as a trait in `rag-core` (a "core consumes"
/// collaborator, like `ChatModel`/`Embedder`) so the context does not
/// depend on `rag-eventbus`'s concrete bus implementation; `rag-eventbus`
/// provides the implementors.
#[async_trait]
pub trait EventBusHandle: Send + Sync {
    /// Fan out `event` to every handler registered for its kind, in
    /// registration order. Handler errors are logged by the implementor,
    /// never propagated to the caller.
    async fn emit(&self, event: StreamEvent);
}

#[cfg(test)]
mod tests {
    use super::{StreamEvent, StreamEventKind};

    #[test]
    fn done_marks_last_chunk() {
        let e = StreamEvent::new("e1", StreamEventKind::Thought, "s1", "hello").done();
        assert!(e.done);
        assert_eq!(e.content, "hello");
    }

    #[test]
    fn wire_kind_serializes_to_spec_strings() {
        let json = serde_json::to_string(&StreamEventKind::FinalAnswer).unwrap();
        assert_eq!(json, "\"agent.final_answer\"");
    }
}
