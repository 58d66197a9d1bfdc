//! HTTP implementation of [`GeminiApi`].

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use ragway_core::{Error, Result};

use super::*;
use crate::adapter::VendorStream;
use crate::http::{check_status, json_body, sse_events, transport, upstream_error};

/// Gemini REST client bound to one API key.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilePage {
    #[serde(default)]
    files: Vec<GeminiFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct UploadedFile {
    file: GeminiFile,
}

impl GeminiClient {
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
            .header("x-goog-api-key", &self.api_key)
    }
}

/// `models/gemini-1.5-flash` and `gemini-1.5-flash` name the same model.
fn model_path(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

/// Accept both `files/<id>` and a bare id.
fn file_path(name: &str) -> String {
    if name.starts_with("files/") {
        name.to_string()
    } else {
        format!("files/{}", name)
    }
}

#[async_trait]
impl GeminiApi for GeminiClient {
    async fn list_files(&self) -> Result<Vec<GeminiFile>> {
        let mut files = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut builder = self
                .request(Method::GET, "v1beta/files")
                .query(&[("pageSize", "100")]);
            if let Some(t) = &token {
                builder = builder.query(&[("pageToken", t.as_str())]);
            }
            let response = builder.send().await.map_err(transport)?;
            let page: FilePage = json_body(response).await?;
            files.extend(page.files);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("Listed {} Gemini file(s)", files.len());
        Ok(files)
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        mime_type: &str,
    ) -> Result<GeminiFile> {
        let start = self
            .request(Method::POST, "upload/v1beta/files")
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(transport)?;
        let start = check_status(start).await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Parse("upload session returned no upload URL".into()))?;

        let response = self
            .http
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;
        let uploaded: UploadedFile = json_body(response).await?;
        debug!("Uploaded {} as {}", display_name, uploaded.file.name);
        Ok(uploaded.file)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("v1beta/{}", file_path(name)))
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }

    async fn stream_generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<VendorStream<GenerateChunk>> {
        let response = self
            .request(
                Method::POST,
                &format!("v1beta/models/{}:streamGenerateContent", model_path(model)),
            )
            .query(&[("alt", "sse")])
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        debug!("Gemini stream opened with model {}", model);

        let mut events = Box::pin(sse_events(response));
        Ok(Box::pin(async_stream::stream! {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => match parse_chunk(&event.data) {
                        Ok(chunk) => yield Ok(chunk),
                        Err(e @ Error::Parse(_)) => warn!("Skipping unreadable Gemini chunk: {}", e),
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
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

/// Decode one streamed chunk. An in-band `error` object becomes an error.
pub fn parse_chunk(data: &str) -> Result<GenerateChunk> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| Error::Parse(e.to_string()))?;
    if let Some(error) = value.get("error") {
        let status = error["code"]
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(500);
        return Err(upstream_error(status, data));
    }
    serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_chunk() {
        let chunk = parse_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"}}],"usageMetadata":{"promptTokenCount":40,"candidatesTokenCount":2,"totalTokenCount":42}}"#,
        )
        .unwrap();
        assert_eq!(chunk.text(), "Hello");
        assert_eq!(
            chunk.usage_metadata,
            Some(UsageMetadata {
                prompt_token_count: 40,
                candidates_token_count: 2,
            })
        );
    }

    #[test]
    fn test_parse_chunk_without_candidates() {
        let chunk = parse_chunk(r#"{"usageMetadata":{"promptTokenCount":5}}"#).unwrap();
        assert_eq!(chunk.text(), "");
        assert_eq!(chunk.usage_metadata.unwrap().candidates_token_count, 0);
    }

    #[test]
    fn test_parse_in_band_error() {
        let err = parse_chunk(r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[test]
    fn test_parse_out_of_range_code() {
        let err = parse_chunk(r#"{"error":{"code":70000,"message":"odd"}}"#).unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 500, .. }));
        let err = parse_chunk(
            r#"{"error":{"code":400,"message":"API key not valid.","details":[{"reason":"API_KEY_INVALID"}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential(_)));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_chunk("not json"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_paths() {
        assert_eq!(model_path("models/gemini-1.5-flash"), "gemini-1.5-flash");
        assert_eq!(model_path("gemini-1.5-pro"), "gemini-1.5-pro");
        assert_eq!(file_path("files/abc"), "files/abc");
        assert_eq!(file_path("abc"), "files/abc");
    }
}
