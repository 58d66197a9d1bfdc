//! Client-side turn accumulator.
//!
//! Rebuilds the in-flight assistant message from a frame stream. The message
//! is swapped for a fresh `Arc` on every frame so observers can detect change
//! with `Arc::ptr_eq` instead of comparing content.

use std::fmt::Display;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::decoder::FrameDecoder;
use crate::frame::{StreamFrame, UsageSummary};
use crate::message::{ChatMessage, Role};

/// Final state of one consumed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: Arc<ChatMessage>,
    pub usage: Option<UsageSummary>,
    pub error: Option<String>,
}

/// Accumulates frames into one assistant message and reports usage once.
pub struct ChatAccumulator<F>
where
    F: FnMut(&UsageSummary),
{
    decoder: FrameDecoder,
    message: Arc<ChatMessage>,
    text: String,
    usage: Option<UsageSummary>,
    error: Option<String>,
    on_usage: F,
}

impl<F> ChatAccumulator<F>
where
    F: FnMut(&UsageSummary),
{
    pub fn new(on_usage: F) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            message: Arc::new(ChatMessage::assistant("")),
            text: String::new(),
            usage: None,
            error: None,
            on_usage,
        }
    }

    /// The current in-flight assistant message.
    pub fn message(&self) -> Arc<ChatMessage> {
        self.message.clone()
    }

    /// Feed raw bytes. Returns true if the visible message changed.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let frames = self.decoder.push(chunk);
        self.apply_all(frames)
    }

    /// Record a transport failure that cut the stream short.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.apply(StreamFrame::Error(reason.into()));
    }

    /// Flush pending bytes and return the outcome.
    pub fn finish(mut self) -> TurnOutcome {
        let frames = self.decoder.finish();
        self.apply_all(frames);
        TurnOutcome {
            message: self.message,
            usage: self.usage,
            error: self.error,
        }
    }

    fn apply_all(&mut self, frames: Vec<StreamFrame>) -> bool {
        let mut changed = false;
        for frame in frames {
            changed |= self.apply(frame);
        }
        changed
    }

    fn apply(&mut self, frame: StreamFrame) -> bool {
        match frame {
            StreamFrame::TextDelta(fragment) => {
                self.text.push_str(&fragment);
                self.replace_message(self.text.clone());
                true
            }
            StreamFrame::Usage(usage) => {
                if self.usage.is_some() {
                    warn!("Ignoring duplicate usage frame");
                    return false;
                }
                debug!(
                    "Turn usage: {} in / {} out ({})",
                    usage.input_tokens, usage.output_tokens, usage.model
                );
                (self.on_usage)(&usage);
                self.usage = Some(usage);
                false
            }
            StreamFrame::Error(reason) => {
                // A failed turn still renders as one assistant message.
                let content = if self.text.is_empty() {
                    reason.clone()
                } else {
                    format!("{}\n\n{}", self.text, reason)
                };
                self.error = Some(reason);
                self.replace_message(content);
                true
            }
        }
    }

    fn replace_message(&mut self, content: String) {
        self.message = Arc::new(ChatMessage {
            id: self.message.id.clone(),
            role: Role::Assistant,
            content,
        });
    }
}

/// Consume a whole response body into a [`TurnOutcome`].
pub async fn read_turn<S, B, E, F>(body: S, on_usage: F) -> TurnOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&UsageSummary),
{
    let mut accumulator = ChatAccumulator::new(on_usage);
    futures::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                accumulator.push(bytes.as_ref());
            }
            Err(e) => {
                accumulator.fail(format!("Stream read error: {}", e));
                break;
            }
        }
    }
    accumulator.finish()
}
