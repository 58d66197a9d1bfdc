//! Assistants run adapter: thread, one appended message, streaming run.

use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use ragway_core::{Error, Result};
use ragway_protocol::message::last_user_index;
use ragway_protocol::{ChatMessage, StreamFrame, UsageSummary};

use super::{OpenAiApi, RunEvent};
use crate::adapter::FrameStream;

/// Streams an assistant run on a (possibly new) thread.
pub struct AssistantRunAdapter {
    api: Arc<dyn OpenAiApi>,
    assistant_id: String,
    thread_id: Option<String>,
    model: String,
}

impl AssistantRunAdapter {
    pub fn new(
        api: Arc<dyn OpenAiApi>,
        assistant_id: impl Into<String>,
        thread_id: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
            thread_id,
            model: model.into(),
        }
    }

    /// The thread already holds earlier turns, so only the newest user
    /// message is appended.
    pub async fn open(self, history: Vec<ChatMessage>) -> Result<FrameStream> {
        let newest = last_user_index(&history)
            .map(|i| history[i].content.clone())
            .ok_or_else(|| Error::InvalidRequest("no user message to send".into()))?;

        // A missing assistant must surface before the thread is touched.
        self.api.retrieve_assistant(&self.assistant_id).await?;

        let thread_id = match self.thread_id.as_deref() {
            Some(existing) => match self.api.add_user_message(existing, &newest).await {
                Ok(()) => existing.to_string(),
                Err(e) if e.is_not_found() => {
                    warn!("Thread {} no longer exists, starting a new one", existing);
                    self.new_thread_with(&newest).await?
                }
                Err(e) => return Err(e),
            },
            None => self.new_thread_with(&newest).await?,
        };

        let mut events = self.api.stream_run(&thread_id, &self.assistant_id).await?;
        debug!("Run started for assistant {} on {}", self.assistant_id, thread_id);

        let model = self.model;
        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(RunEvent::MessageDelta(text)) => {
                        if !text.is_empty() {
                            yield StreamFrame::TextDelta(text);
                        }
                    }
                    Ok(RunEvent::Completed { usage, model: run_model }) => {
                        let usage = usage.unwrap_or_default();
                        yield StreamFrame::Usage(UsageSummary {
                            input_tokens: usage.prompt_tokens,
                            output_tokens: usage.completion_tokens,
                            model: run_model.unwrap_or_else(|| model.clone()),
                            thread_id: Some(thread_id.clone()),
                        });
                        return;
                    }
                    Ok(RunEvent::Failed(reason)) => {
                        warn!("Run failed: {}", reason);
                        yield StreamFrame::Error(reason);
                        return;
                    }
                    Ok(RunEvent::Other(_)) => {}
                    Err(e) => {
                        warn!("Run stream aborted: {}", e);
                        yield StreamFrame::Error(e.to_string());
                        return;
                    }
                }
            }
        }))
    }

    async fn new_thread_with(&self, content: &str) -> Result<String> {
        let thread = self.api.create_thread().await?;
        info!("Created thread {}", thread.id);
        self.api.add_user_message(&thread.id, content).await?;
        Ok(thread.id)
    }
}
