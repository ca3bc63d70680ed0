//! The rewrite plugin (`EventKind::RewriteQuery`): turns a follow-up
//! utterance into a self-contained search query by folding in recent
//! history, via the `ChatModel` collaborator. A no-op when
//! `ctx.enable_rewrite` is false or there's no history to fold in.

use async_trait::async_trait;
use rag_core::collaborators::{ChatMessage, ChatModel, ChatRole};
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::AppError;
use std::sync::Arc;

const REWRITE_SYSTEM_PROMPT: &str = "Rewrite the user's latest message into a standalone search query \
that preserves its intent without needing the conversation history. Reply with only the rewritten query.";

pub struct RewritePlugin {
    chat_model: Arc<dyn ChatModel>,
}

impl RewritePlugin {
    #[must_use]
    pub fn new(chat_model: Arc<dyn ChatModel>) -> Self {
        Self { chat_model }
    }
}

#[async_trait]
impl crate::event_manager::Plugin for RewritePlugin {
    fn activation_events(&self) -> Vec<EventKind> {
        vec![EventKind::RewriteQuery]
    }

    async fn on_event(&self, _kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError> {
        if !ctx.enable_rewrite || ctx.history.is_empty() {
            return Ok(());
        }

        let mut messages = vec![ChatMessage::new(ChatRole::System, REWRITE_SYSTEM_PROMPT)];
        for turn in &ctx.history {
            messages.push(ChatMessage::new(ChatRole::User, turn.turn_id.clone()));
        }
        messages.push(ChatMessage::new(ChatRole::User, ctx.query.clone()));

        match self.chat_model.chat(&messages).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                ctx.rewrite_query = Some(rewritten.trim().to_string());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "query rewrite failed, falling back to the original query");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RewritePlugin;
    use crate::event_manager::Plugin;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use rag_core::collaborators::{ChatMessage, ChatModel, ChatStreamItem};
    use rag_core::model::chat_context::{ChatContext, EventKind, HistoryTurn};
    use rag_core::AppError;
    use std::sync::Arc;

    struct StubChatModel(String);

    #[async_trait]
    impl ChatModel for StubChatModel {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, AppError> {
            Ok(self.0.clone())
        }

        async fn chat_stream(&self, _messages: &[ChatMessage]) -> Result<BoxStream<'static, ChatStreamItem>, AppError> {
            unimplemented!("not exercised by rewrite tests")
        }
    }

    #[tokio::test]
    async fn rewrites_when_history_present() {
        let plugin = RewritePlugin::new(Arc::new(StubChatModel("rewritten query".to_string())));
        let mut ctx = ChatContext::new("s1", "t1", "and what about that");
        ctx.history.push(HistoryTurn { turn_id: "turn-1".into(), knowledge_references: vec![] });
        plugin.on_event(EventKind::RewriteQuery, &mut ctx).await.unwrap();
        assert_eq!(ctx.rewrite_query.as_deref(), Some("rewritten query"));
    }

    #[tokio::test]
    async fn skips_rewrite_without_history() {
        let plugin = RewritePlugin::new(Arc::new(StubChatModel("rewritten".to_string())));
        let mut ctx = ChatContext::new("s1", "t1", "hello");
        plugin.on_event(EventKind::RewriteQuery, &mut ctx).await.unwrap();
        assert!(ctx.rewrite_query.is_none());
    }

    #[tokio::test]
    async fn skips_rewrite_when_disabled() {
        let plugin = RewritePlugin::new(Arc::new(StubChatModel("rewritten".to_string())));
        let mut ctx = ChatContext::new("s1", "t1", "hello");
        ctx.enable_rewrite = false;
        ctx.history.push(HistoryTurn { turn_id: "turn-1".into(), knowledge_references: vec![] });
        plugin.on_event(EventKind::RewriteQuery, &mut ctx).await.unwrap();
        assert!(ctx.rewrite_query.is_none());
    }
}
