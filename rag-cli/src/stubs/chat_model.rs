//! A canned `ChatModel` for local exercising: no network call, deterministic
//! output, so the demo binary runs with nothing configured. Grounded the way
//! the teacher hand-writes test doubles rather than mocking (SPEC_FULL §B
//! "Test tooling").

use async_trait::async_trait;
use futures::stream::BoxStream;
use rag_core::collaborators::{ChatMessage, ChatModel, ChatRole, ChatStreamItem};
use rag_core::AppError;

pub struct CannedChatModel;

#[async_trait]
impl ChatModel for CannedChatModel {
    /// Folds every user-role message into one standalone query string, the
    /// query-rewrite stage's job (spec §4.1 `RewriteQuery`). A real model
    /// would resolve pronouns/ellipsis against history; this one simply
    /// concatenates, which is enough to exercise the stage without an LLM.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AppError> {
        let folded: Vec<&str> = messages.iter().filter(|m| m.role == ChatRole::User).map(|m| m.content.as_str()).collect();
        Ok(folded.join(" "))
    }

    /// Synthesizes an answer out of the system "Context:" block and the
    /// final user message, streamed word by word so the streaming plugin's
    /// one-ahead buffering has more than a single chunk to exercise.
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<BoxStream<'static, ChatStreamItem>, AppError> {
        let context = messages.iter().find(|m| m.role == ChatRole::System).map(|m| m.content.clone());
        let query = messages.iter().rev().find(|m| m.role == ChatRole::User).map(|m| m.content.clone()).unwrap_or_default();

        let answer = match context {
            Some(context) => format!("Based on the retrieved passages:\n{context}\n\nRegarding \"{query}\", the above is the most relevant material I found."),
            None => format!("I have no relevant passages for \"{query}\"."),
        };

        let chunks: Vec<ChatStreamItem> = answer.split_inclusive(' ').map(|word| Ok(word.to_string())).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
