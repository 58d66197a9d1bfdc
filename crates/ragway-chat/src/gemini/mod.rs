//! Gemini: file-grounded streaming chat and document management.

mod adapter;
mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ragway_core::Result;

use crate::adapter::VendorStream;
use crate::types::DocumentRecord;

pub use adapter::{build_request, GeminiAdapter};
pub use client::{parse_chunk, GeminiClient};

pub const STATE_ACTIVE: &str = "ACTIVE";

/// A file held by the Files API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFile {
    /// Resource name, `files/<id>`.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub create_time: String,
}

impl GeminiFile {
    pub fn is_active(&self) -> bool {
        self.state == STATE_ACTIVE
    }

    /// Human-facing name: display name when set.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Bare id without the `files/` prefix, safe in a URL path segment.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("files/").unwrap_or(&self.name)
    }

    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            id: self.id().to_string(),
            name: self.label().to_string(),
            status: self.state.to_ascii_lowercase(),
            created_at: self.create_time.clone(),
        }
    }
}

/// Body of a `streamGenerateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

/// One streamed response chunk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateChunk {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Cumulative token counts; each chunk restates the totals so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

/// The Gemini endpoints the gateway uses, bound to one credential.
#[async_trait]
pub trait GeminiApi: Send + Sync {
    async fn list_files(&self) -> Result<Vec<GeminiFile>>;

    async fn upload_file(&self, bytes: Vec<u8>, display_name: &str, mime_type: &str)
        -> Result<GeminiFile>;

    async fn delete_file(&self, name: &str) -> Result<()>;

    async fn stream_generate(&self, model: &str, request: &GenerateRequest)
        -> Result<VendorStream<GenerateChunk>>;
}

#[cfg(test)]
pub(crate) mod fake;
