//! The closed set of provider adapters.

use std::pin::Pin;

use futures::Stream;

use ragway_core::Result;
use ragway_protocol::{ChatMessage, StreamFrame};

use crate::gemini::GeminiAdapter;
use crate::openai::{AssistantRunAdapter, CompletionAdapter};

/// Frames produced for one chat turn, in wire order.
pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

/// Decoded events from a vendor streaming endpoint.
pub type VendorStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// One adapter per upstream streaming protocol.
pub enum Adapter {
    Gemini(GeminiAdapter),
    AssistantRun(AssistantRunAdapter),
    Completion(CompletionAdapter),
}

impl Adapter {
    /// Open the upstream stream.
    ///
    /// Failures before the first frame come back as `Err` so the caller can
    /// answer with a plain HTTP error; later failures become a terminal
    /// [`StreamFrame::Error`].
    pub async fn open(self, history: Vec<ChatMessage>) -> Result<FrameStream> {
        match self {
            Adapter::Gemini(a) => a.open(history).await,
            Adapter::AssistantRun(a) => a.open(history).await,
            Adapter::Completion(a) => a.open(history).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Adapter::Gemini(_) => "gemini",
            Adapter::AssistantRun(_) => "openai-assistant",
            Adapter::Completion(_) => "openai-completion",
        }
    }
}
