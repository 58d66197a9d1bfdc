//! HTTP plumbing shared by the vendor clients: status mapping and SSE reading.

use futures::Stream;
use reqwest::Response;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use ragway_core::{Error, Result};

/// Map a transport-level reqwest failure.
pub fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

/// Pass successful responses through; turn the rest into typed errors.
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Upstream returned {}: {}", status, truncate(&body, 300));
    Err(upstream_error(status.as_u16(), &body))
}

/// Classify a failed vendor response from its status and raw body.
///
/// Gemini rejects a bad key with 400 `INVALID_ARGUMENT` and the reason
/// `API_KEY_INVALID` rather than 401/403.
pub fn upstream_error(status: u16, body: &str) -> Error {
    let message = upstream_message(body, status);
    if status == 400 && rejects_api_key(body) {
        return Error::InvalidCredential(message);
    }
    Error::from_status(status, message)
}

fn rejects_api_key(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    value["error"]["details"]
        .as_array()
        .map(|details| details.iter().any(|d| d["reason"] == "API_KEY_INVALID"))
        .unwrap_or(false)
}

/// Decode a JSON body after a status check.
pub async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Parse(e.to_string()))
}

/// Vendors wrap messages as `{"error": {"message": ...}}`.
fn upstream_message(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                truncate(body, 300).to_string()
            }
        })
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE parser with a carry-over buffer for split reads.
#[derive(Debug, Default)]
pub struct SseParser {
    carry: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.carry.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.carry[start..end])
                .trim_end_matches('\r')
                .to_string();
            start = end + 1;
            if let Some(event) = self.line(&line) {
                events.push(event);
            }
        }
        self.carry.drain(..start);
        events
    }

    /// Dispatch whatever is buffered when the body ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.carry);
        if !rest.is_empty() {
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(event) = self.line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

/// Read a streaming response body as SSE events.
pub fn sse_events(response: Response) -> impl Stream<Item = Result<SseEvent>> + Send + 'static {
    async_stream::stream! {
        let mut body = response.bytes_stream();
        let mut parser = SseParser::new();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(Error::Transport(format!("Stream read error: {}", e)));
                    return;
                }
            };
            for event in parser.push(&bytes) {
                yield Ok(event);
            }
        }

        if let Some(event) = parser.finish() {
            yield Ok(event);
        }
        debug!("SSE body finished");
    }
}
