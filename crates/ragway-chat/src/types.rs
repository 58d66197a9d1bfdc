//! Request and resource types shared across adapters and routes.

use serde::{Deserialize, Serialize};

use ragway_protocol::ChatMessage;

/// Upstream vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAI,
}

impl Provider {
    /// Resolve a provider tag. Absent or unknown tags fall back to Gemini.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("openai") => Provider::OpenAI,
            _ => Provider::Gemini,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
}

/// One chat turn as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Full history, oldest first, ending with the newest user message.
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default, rename = "assistantId")]
    pub assistant_id: Option<String>,
    #[serde(default, rename = "threadId")]
    pub thread_id: Option<String>,
}

impl ChatRequest {
    pub fn provider(&self) -> Provider {
        Provider::from_tag(self.provider.as_deref())
    }

    pub fn assistant_id(&self) -> Option<&str> {
        non_empty(self.assistant_id.as_deref())
    }

    pub fn thread_id(&self) -> Option<&str> {
        non_empty(self.thread_id.as_deref())
    }

    pub fn model(&self) -> Option<&str> {
        non_empty(self.model.as_deref())
    }
}

/// Treat blank handles the same as missing ones.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolved OpenAI assistant and its vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantResources {
    #[serde(rename = "assistantId")]
    pub assistant_id: String,
    #[serde(rename = "vectorStoreId")]
    pub vector_store_id: String,
}

/// A document known to a vendor, in the shape the client lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Unix seconds to RFC 3339; empty when out of range.
pub fn unix_to_rfc3339(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tag_defaults_to_gemini() {
        assert_eq!(Provider::from_tag(None), Provider::Gemini);
        assert_eq!(Provider::from_tag(Some("")), Provider::Gemini);
        assert_eq!(Provider::from_tag(Some("anthropic")), Provider::Gemini);
        assert_eq!(Provider::from_tag(Some("gemini")), Provider::Gemini);
        assert_eq!(Provider::from_tag(Some(" OpenAI ")), Provider::OpenAI);
    }

    #[test]
    fn test_request_deserialize() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"id": "1", "role": "user", "content": "What is X?"}],
            "provider": "openai",
            "apiKey": "k",
            "assistantId": "asst_1",
            "threadId": "  ",
        }))
        .unwrap();
        assert_eq!(req.provider(), Provider::OpenAI);
        assert_eq!(req.assistant_id(), Some("asst_1"));
        assert_eq!(req.thread_id(), None);
        assert_eq!(req.model(), None);
        assert_eq!(req.messages[0].content, "What is X?");
    }

    #[test]
    fn test_message_id_is_optional() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"role": "assistant", "content": "hi"}],
        }))
        .unwrap();
        assert!(!req.messages[0].id.is_empty());
        assert!(req.api_key.is_empty());
    }

    #[test]
    fn test_unix_to_rfc3339() {
        assert_eq!(unix_to_rfc3339(0), "1970-01-01T00:00:00+00:00");
    }
}
