//! Frame types and the line encoder.

use serde::{Deserialize, Serialize};

use ragway_core::{Error, Result};

pub const TEXT_MARKER: &str = "0";
pub const USAGE_MARKER: &str = "2";
pub const ERROR_MARKER: &str = "3";

/// Token accounting reported once at the end of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
    /// Thread the turn ran on, for providers that keep server-side threads.
    pub thread_id: Option<String>,
}

/// One unit of the client-facing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    TextDelta(String),
    Usage(UsageSummary),
    /// Terminal failure after the stream has started.
    Error(String),
}

#[derive(Serialize, Deserialize)]
struct UsageBody {
    #[serde(rename = "inputTokens")]
    input_tokens: u64,
    #[serde(rename = "outputTokens")]
    output_tokens: u64,
    model: String,
}

#[derive(Serialize, Deserialize)]
struct UsagePayload {
    usage: UsageBody,
    #[serde(
        rename = "threadId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    thread_id: Option<String>,
}

impl StreamFrame {
    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::TextDelta(_))
    }

    /// Encode as one newline-terminated wire line.
    pub fn encode(&self) -> String {
        let (marker, payload) = match self {
            StreamFrame::TextDelta(text) => (TEXT_MARKER, json_string(text)),
            StreamFrame::Error(message) => (ERROR_MARKER, json_string(message)),
            StreamFrame::Usage(usage) => {
                let payload = UsagePayload {
                    usage: UsageBody {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        model: usage.model.clone(),
                    },
                    thread_id: usage.thread_id.clone(),
                };
                (
                    USAGE_MARKER,
                    serde_json::to_string(&payload).unwrap_or_else(|_| "{}".into()),
                )
            }
        };
        format!("{}:{}\n", marker, payload)
    }

    /// Decode one line (without terminator).
    ///
    /// `Ok(None)` means the line carried nothing to act on: blank, or an
    /// unknown marker (logged).
    pub fn decode_line(line: &str) -> Result<Option<StreamFrame>> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return Ok(None);
        }

        let (marker, payload) = line
            .split_once(':')
            .ok_or_else(|| Error::Parse(format!("frame without marker: {:?}", truncate(line))))?;

        match marker {
            TEXT_MARKER => Ok(Some(StreamFrame::TextDelta(parse_payload(payload)?))),
            ERROR_MARKER => Ok(Some(StreamFrame::Error(parse_payload(payload)?))),
            USAGE_MARKER => {
                let parsed: UsagePayload = parse_payload(payload)?;
                Ok(Some(StreamFrame::Usage(UsageSummary {
                    input_tokens: parsed.usage.input_tokens,
                    output_tokens: parsed.usage.output_tokens,
                    model: parsed.usage.model,
                    thread_id: parsed.thread_id,
                })))
            }
            other => {
                tracing::warn!("Skipping frame with unknown marker {:?}", other);
                Ok(None)
            }
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T> {
    serde_json::from_str(payload).map_err(|e| Error::Parse(e.to_string()))
}

// Serializing a &str cannot fail.
fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn truncate(line: &str) -> &str {
    match line.char_indices().nth(64) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
