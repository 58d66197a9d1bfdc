//! Plain chat-completion adapter, used when no assistant is configured.

use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::warn;

use ragway_core::{Error, Result};
use ragway_protocol::message::last_user_index;
use ragway_protocol::{ChatMessage, StreamFrame, UsageSummary};

use super::{CompletionMessage, OpenAiApi, TokenUsage};
use crate::adapter::FrameStream;
use crate::prompts::COMPLETION_SYSTEM_PROMPT;

pub struct CompletionAdapter {
    api: Arc<dyn OpenAiApi>,
    model: String,
}

impl CompletionAdapter {
    pub fn new(api: Arc<dyn OpenAiApi>, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
        }
    }

    pub async fn open(self, history: Vec<ChatMessage>) -> Result<FrameStream> {
        if last_user_index(&history).is_none() {
            return Err(Error::InvalidRequest("no user message to send".into()));
        }
        let messages = completion_messages(&history);
        let mut chunks = self.api.stream_completion(&self.model, &messages).await?;

        let model = self.model;
        Ok(Box::pin(async_stream::stream! {
            let mut usage: Option<(TokenUsage, Option<String>)> = None;
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => {
                        if let Some(text) = chunk.content {
                            yield StreamFrame::TextDelta(text);
                        }
                        if let Some(reported) = chunk.usage {
                            usage = Some((reported, chunk.model));
                        }
                    }
                    Err(e) => {
                        warn!("Completion stream aborted: {}", e);
                        yield StreamFrame::Error(e.to_string());
                        return;
                    }
                }
            }
            if let Some((reported, reported_model)) = usage {
                yield StreamFrame::Usage(UsageSummary {
                    input_tokens: reported.prompt_tokens,
                    output_tokens: reported.completion_tokens,
                    model: reported_model.unwrap_or_else(|| model.clone()),
                    thread_id: None,
                });
            }
        }))
    }
}

/// Fixed system prompt followed by the full history.
fn completion_messages(history: &[ChatMessage]) -> Vec<CompletionMessage> {
    std::iter::once(CompletionMessage {
        role: "system".into(),
        content: COMPLETION_SYSTEM_PROMPT.into(),
    })
    .chain(history.iter().map(|m| CompletionMessage {
        role: m.role.to_string(),
        content: m.content.clone(),
    }))
    .collect()
}
