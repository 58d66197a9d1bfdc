//! OpenAI: assistants with file search, threads, runs, and plain completions.

mod client;
mod completion;
mod lifecycle;
mod run;
mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ragway_core::Result;

use crate::adapter::VendorStream;

pub use client::{parse_completion_chunk, parse_run_event, OpenAiClient};
pub use completion::CompletionAdapter;
pub use lifecycle::ResourceManager;
pub use run::AssistantRunAdapter;
pub use session::{session_key, SessionRegistry};

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub tool_resources: Option<ToolResources>,
}

impl Assistant {
    /// First vector store attached for file search, if any.
    pub fn vector_store_id(&self) -> Option<&str> {
        self.tool_resources
            .as_ref()?
            .file_search
            .as_ref()?
            .vector_store_ids
            .first()
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolResources {
    #[serde(default)]
    pub file_search: Option<FileSearchResources>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileSearchResources {
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStore {
    pub id: String,
}

/// An uploaded file object.
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub created_at: i64,
}

/// A file's attachment to a vector store, with its ingestion status.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Settings for a newly created assistant.
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
}

/// Run stream events the gateway cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    MessageDelta(String),
    Completed {
        usage: Option<TokenUsage>,
        model: Option<String>,
    },
    Failed(String),
    /// Any other event kind, by name.
    Other(String),
}

/// One decoded chat-completion chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionChunk {
    pub content: Option<String>,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

/// The OpenAI endpoints the gateway uses, bound to one credential.
#[async_trait]
pub trait OpenAiApi: Send + Sync {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant>;

    async fn create_assistant(&self, spec: &AssistantSpec, vector_store_id: &str)
        -> Result<Assistant>;

    /// Point the assistant's file search at `vector_store_id` and persist it.
    async fn attach_vector_store(&self, assistant_id: &str, vector_store_id: &str)
        -> Result<Assistant>;

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore>;

    async fn upload_file(&self, bytes: Vec<u8>, file_name: &str, mime_type: &str)
        -> Result<FileObject>;

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    async fn add_vector_store_file(&self, vector_store_id: &str, file_id: &str)
        -> Result<VectorStoreFile>;

    async fn get_vector_store_file(&self, vector_store_id: &str, file_id: &str)
        -> Result<VectorStoreFile>;

    async fn list_vector_store_files(&self, vector_store_id: &str) -> Result<Vec<VectorStoreFile>>;

    async fn remove_vector_store_file(&self, vector_store_id: &str, file_id: &str) -> Result<()>;

    async fn create_thread(&self) -> Result<Thread>;

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<()>;

    async fn stream_run(&self, thread_id: &str, assistant_id: &str)
        -> Result<VendorStream<RunEvent>>;

    async fn stream_completion(&self, model: &str, messages: &[CompletionMessage])
        -> Result<VendorStream<CompletionChunk>>;
}

#[cfg(test)]
pub(crate) mod fake;
