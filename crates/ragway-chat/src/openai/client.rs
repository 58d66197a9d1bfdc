//! HTTP implementation of [`OpenAiApi`].

use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use ragway_core::{Error, Result};

use super::*;
use crate::adapter::VendorStream;
use crate::http::{check_status, json_body, sse_events, transport, SseEvent};

/// OpenAI REST client bound to one API key.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

impl OpenAiClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send_json<T: serde::de::DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(transport)?;
        json_body(response).await
    }

    async fn send_unit(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder.send().await.map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl OpenAiApi for OpenAiClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.send_json(self.request(Method::GET, &format!("assistants/{}", assistant_id)))
            .await
    }

    async fn create_assistant(
        &self,
        spec: &AssistantSpec,
        vector_store_id: &str,
    ) -> Result<Assistant> {
        let body = json!({
            "name": spec.name,
            "instructions": spec.instructions,
            "model": spec.model,
            "tools": [{"type": "file_search"}],
            "tool_resources": {"file_search": {"vector_store_ids": [vector_store_id]}},
        });
        self.send_json(self.request(Method::POST, "assistants").json(&body))
            .await
    }

    async fn attach_vector_store(
        &self,
        assistant_id: &str,
        vector_store_id: &str,
    ) -> Result<Assistant> {
        let body = json!({
            "tools": [{"type": "file_search"}],
            "tool_resources": {"file_search": {"vector_store_ids": [vector_store_id]}},
        });
        self.send_json(
            self.request(Method::POST, &format!("assistants/{}", assistant_id))
                .json(&body),
        )
        .await
    }

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore> {
        self.send_json(
            self.request(Method::POST, "vector_stores")
                .json(&json!({ "name": name })),
        )
        .await
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<FileObject> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| Error::InvalidRequest(format!("bad mime type {}: {}", mime_type, e)))?;
        let form = multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);
        self.send_json(self.request(Method::POST, "files").multipart(form))
            .await
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject> {
        self.send_json(self.request(Method::GET, &format!("files/{}", file_id)))
            .await
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.send_unit(self.request(Method::DELETE, &format!("files/{}", file_id)))
            .await
    }

    async fn add_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile> {
        self.send_json(
            self.request(Method::POST, &format!("vector_stores/{}/files", vector_store_id))
                .json(&json!({ "file_id": file_id })),
        )
        .await
    }

    async fn get_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile> {
        self.send_json(self.request(
            Method::GET,
            &format!("vector_stores/{}/files/{}", vector_store_id, file_id),
        ))
        .await
    }

    async fn list_vector_store_files(&self, vector_store_id: &str) -> Result<Vec<VectorStoreFile>> {
        let mut files = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut builder = self
                .request(Method::GET, &format!("vector_stores/{}/files", vector_store_id))
                .query(&[("limit", "100")]);
            if let Some(cursor) = &after {
                builder = builder.query(&[("after", cursor.as_str())]);
            }
            let page: Page<VectorStoreFile> = self.send_json(builder).await?;
            files.extend(page.data);
            match (page.has_more, page.last_id) {
                (true, Some(last)) => after = Some(last),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn remove_vector_store_file(&self, vector_store_id: &str, file_id: &str) -> Result<()> {
        self.send_unit(self.request(
            Method::DELETE,
            &format!("vector_stores/{}/files/{}", vector_store_id, file_id),
        ))
        .await
    }

    async fn create_thread(&self) -> Result<Thread> {
        self.send_json(self.request(Method::POST, "threads").json(&json!({})))
            .await
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<()> {
        self.send_unit(
            self.request(Method::POST, &format!("threads/{}/messages", thread_id))
                .json(&json!({ "role": "user", "content": content })),
        )
        .await
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<VendorStream<RunEvent>> {
        let response = self
            .request(Method::POST, &format!("threads/{}/runs", thread_id))
            .json(&json!({ "assistant_id": assistant_id, "stream": true }))
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        debug!("Run stream opened on thread {}", thread_id);

        let mut events = Box::pin(sse_events(response));
        Ok(Box::pin(async_stream::stream! {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => match parse_run_event(&event) {
                        Ok(Some(parsed)) => yield Ok(parsed),
                        Ok(None) => return,
                        Err(e) => warn!("Skipping unreadable run event: {}", e),
                    },
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }))
    }

    async fn stream_completion(
        &self,
        model: &str,
        messages: &[CompletionMessage],
    ) -> Result<VendorStream<CompletionChunk>> {
        let body = json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });
        let response = self
            .request(Method::POST, "chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        debug!("Completion stream opened with model {}", model);

        let mut events = Box::pin(sse_events(response));
        Ok(Box::pin(async_stream::stream! {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => match parse_completion_chunk(&event.data) {
                        Ok(Some(chunk)) => yield Ok(chunk),
                        Ok(None) => return,
                        Err(e) => warn!("Skipping unreadable completion chunk: {}", e),
                    },
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }))
    }
}

/// Decode one assistants run event. `Ok(None)` marks the end of the stream.
pub fn parse_run_event(event: &SseEvent) -> Result<Option<RunEvent>> {
    if event.data.trim() == "[DONE]" || event.event.as_deref() == Some("done") {
        return Ok(None);
    }
    let name = event.event.clone().unwrap_or_default();
    let parse = || -> Result<serde_json::Value> {
        serde_json::from_str(&event.data).map_err(|e| Error::Parse(e.to_string()))
    };

    let parsed = match name.as_str() {
        "thread.message.delta" => {
            let data = parse()?;
            let text: String = data["delta"]["content"]
                .as_array()
                .map(|blocks| {
                    blocks
                        .iter()
                        .filter(|b| b["type"] == "text")
                        .filter_map(|b| b["text"]["value"].as_str())
                        .collect()
                })
                .unwrap_or_default();
            RunEvent::MessageDelta(text)
        }
        "thread.run.completed" => {
            let data = parse()?;
            RunEvent::Completed {
                usage: serde_json::from_value(data["usage"].clone()).ok(),
                model: data["model"].as_str().map(str::to_string),
            }
        }
        "thread.run.failed" => {
            let data = parse()?;
            let message = data["last_error"]["message"]
                .as_str()
                .unwrap_or("Run failed")
                .to_string();
            RunEvent::Failed(message)
        }
        "error" => {
            let message = parse()
                .ok()
                .and_then(|data| {
                    data["message"]
                        .as_str()
                        .or_else(|| data["error"]["message"].as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| event.data.clone());
            RunEvent::Failed(message)
        }
        _ => RunEvent::Other(name),
    };
    Ok(Some(parsed))
}

/// Decode one chat-completion chunk. `Ok(None)` marks the end of the stream.
pub fn parse_completion_chunk(data: &str) -> Result<Option<CompletionChunk>> {
    if data.trim() == "[DONE]" {
        return Ok(None);
    }
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| Error::Parse(e.to_string()))?;
    Ok(Some(CompletionChunk {
        content: value["choices"][0]["delta"]["content"]
            .as_str()
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        usage: serde_json::from_value(value["usage"].clone()).ok(),
        model: value["model"].as_str().map(str::to_string),
    }))
}
