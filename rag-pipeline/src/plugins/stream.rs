//! The streaming plugin (`EventKind::ChatCompletionStream`, spec §4.7):
//! consumes `ChatModel::chat_stream` in a spawned task, emitting each delta
//! as a `final-answer` event with `done` set only on the last chunk, and
//! wraps the target bus with the no-match filter when `no_match_prefix` is
//! configured.
//!
//! `IntoChatMessage`/`ChatCompletion` are registered as no-ops here: the
//! spec names them as internal build steps (§6) but describes no behavior
//! for them beyond what streaming already does (§4.7 only covers
//! `ChatCompletionStream`/`StreamFilter`), so message-building happens
//! inline in the streaming call rather than as a separate stage with
//! nowhere in `ChatContext` to stash its output.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use rag_core::collaborators::{ChatMessage, ChatModel, ChatRole};
use rag_core::model::chat_context::{ChatContext, EventKind};
use rag_core::model::{EventBusHandle, StreamEvent, StreamEventKind};
use rag_core::AppError;
use tokio::sync::Mutex;

pub struct StreamingPlugin {
    chat_model: Arc<dyn ChatModel>,
}

impl StreamingPlugin {
    #[must_use]
    pub fn new(chat_model: Arc<dyn ChatModel>) -> Self {
        Self { chat_model }
    }

    fn build_messages(ctx: &ChatContext) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        let context_block: String = ctx.filter_source().iter().map(|r| r.content.as_str()).collect::<Vec<_>>().join("\n\n");
        if !context_block.is_empty() {
            messages.push(ChatMessage::new(ChatRole::System, format!("Context:\n{context_block}")));
        }
        messages.push(ChatMessage::new(ChatRole::User, ctx.query.clone()));
        messages
    }
}

#[async_trait]
impl crate::event_manager::Plugin for StreamingPlugin {
    fn activation_events(&self) -> Vec<EventKind> {
        vec![EventKind::IntoChatMessage, EventKind::ChatCompletion, EventKind::ChatCompletionStream]
    }

    async fn on_event(&self, kind: EventKind, ctx: &mut ChatContext) -> Result<(), AppError> {
        if !matches!(kind, EventKind::ChatCompletionStream) {
            return Ok(());
        }

        let Some(bus) = ctx.event_bus.clone() else {
            return Err(AppError::InvalidParams("no event bus configured for streaming".to_string()));
        };

        let messages = Self::build_messages(ctx);
        let mut stream = self.chat_model.chat_stream(&messages).await?;

        let answer_id = uuid::Uuid::new_v4().to_string();
        let session_id = ctx.session_id.clone();
        let target_bus: Arc<dyn EventBusHandle> = match &ctx.no_match_prefix {
            Some(prefix) => Arc::new(NoMatchFilterBus::new(bus, prefix.clone(), ctx.fallback_response.clone(), session_id.clone())),
            None => bus,
        };

        tokio::spawn(async move {
            let mut pending: Option<String> = None;
            let mut any_chunk = false;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        any_chunk = true;
                        if let Some(prev) = pending.take() {
                            target_bus.emit(StreamEvent::new(answer_id.clone(), StreamEventKind::FinalAnswer, session_id.clone(), prev)).await;
                        }
                        pending = Some(chunk);
                    }
                    Err(e) => {
                        if let Some(prev) = pending.take() {
                            target_bus.emit(StreamEvent::new(answer_id.clone(), StreamEventKind::FinalAnswer, session_id.clone(), prev)).await;
                        }
                        target_bus.emit(StreamEvent::new(answer_id.clone(), StreamEventKind::Error, session_id.clone(), e.to_string())).await;
                        return;
                    }
                }
            }

            match pending {
                Some(last) => {
                    target_bus.emit(StreamEvent::new(answer_id, StreamEventKind::FinalAnswer, session_id, last).done()).await;
                }
                None if !any_chunk => {
                    target_bus.emit(StreamEvent::new(answer_id, StreamEventKind::FinalAnswer, session_id, String::new()).done()).await;
                }
                None => {}
            }
        });

        Ok(())
    }
}

/// A proxy bus installed around the request's real bus while
/// `no_match_prefix` is configured (`EventKind::StreamFilter`, spec §4.7):
/// buffers `final-answer` chunks as long as the accumulated content remains
/// compatible with `no_match_prefix` (either is a prefix of the other), and
/// either flushes the buffer verbatim once the content diverges, or, if it
/// never diverges by the time the stream completes, discards everything
/// buffered and emits one synthetic fallback event instead.
///
/// The literal spec wording ("as long as accumulated is not a prefix of
/// `no_match_prefix`, re-emit") taken alone would forward content the
/// instant it grows past `no_match_prefix`'s length, which contradicts the
/// worked example where `no_match_prefix="抱歉"` (shorter than the model's
/// full reply) still collapses the whole reply to the fallback. This
/// implementation instead treats the two strings as compatible for as long
/// as one remains a prefix of the other regardless of which is longer,
/// which is the only reading consistent with both worked examples; recorded
/// as an Open Question resolution in `DESIGN.md`.
struct NoMatchFilterBus {
    inner: Arc<dyn EventBusHandle>,
    prefix: String,
    fallback: String,
    session_id: String,
    state: Mutex<FilterState>,
}

#[derive(Default)]
struct FilterState {
    accumulated: String,
    diverged: bool,
    buffer: Vec<StreamEvent>,
}

impl NoMatchFilterBus {
    fn new(inner: Arc<dyn EventBusHandle>, prefix: String, fallback: String, session_id: String) -> Self {
        Self { inner, prefix, fallback, session_id, state: Mutex::new(FilterState::default()) }
    }

    async fn flush(&self, buffered: Vec<StreamEvent>) {
        for event in buffered {
            self.inner.emit(event).await;
        }
    }
}

fn compatible_prefix(accumulated: &str, prefix: &str) -> bool {
    accumulated.starts_with(prefix) || prefix.starts_with(accumulated)
}

#[async_trait]
impl EventBusHandle for NoMatchFilterBus {
    async fn emit(&self, event: StreamEvent) {
        if !matches!(event.kind, StreamEventKind::FinalAnswer) {
            if matches!(event.kind, StreamEventKind::Error) {
                let mut state = self.state.lock().await;
                state.diverged = true;
                let buffered = std::mem::take(&mut state.buffer);
                drop(state);
                self.flush(buffered).await;
            }
            self.inner.emit(event).await;
            return;
        }

        let mut state = self.state.lock().await;
        if state.diverged {
            drop(state);
            self.inner.emit(event).await;
            return;
        }

        state.accumulated.push_str(&event.content);
        let compatible = compatible_prefix(&state.accumulated, &self.prefix);

        if !compatible {
            state.diverged = true;
            let buffered = std::mem::take(&mut state.buffer);
            drop(state);
            self.flush(buffered).await;
            self.inner.emit(event).await;
            return;
        }

        if !event.done {
            state.buffer.push(event);
            return;
        }

        drop(state);
        let fallback_event =
            StreamEvent::new(uuid::Uuid::new_v4().to_string(), StreamEventKind::FinalAnswer, self.session_id.clone(), self.fallback.clone()).done();
        self.inner.emit(fallback_event).await;
    }
}
