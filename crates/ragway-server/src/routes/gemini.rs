//! Gemini Files API management; the active files ground every Gemini chat turn.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

use ragway_chat::gemini::GeminiApi;
use ragway_chat::DocumentRecord;

use super::{api_key, read_upload};
use crate::error::ApiResult;
use crate::state::AppState;

/// Upload bodies are capped at `max_upload` bytes.
pub fn routes(max_upload: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/gemini/files",
            get(list_files).merge(post(upload_file).layer(DefaultBodyLimit::max(max_upload))),
        )
        .route("/gemini/files/{id}", delete(delete_file))
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let key = api_key(&headers)?;
    let files = state.dispatcher.gemini(&key).list_files().await?;
    let records: Vec<DocumentRecord> = files.iter().map(|f| f.to_record()).collect();
    Ok(Json(json!({ "files": records })))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<DocumentRecord>> {
    let key = api_key(&headers)?;
    let upload = read_upload(multipart).await?;
    let display_name = upload
        .field("displayName")
        .unwrap_or(upload.file_name.as_str())
        .to_string();

    let file = state
        .dispatcher
        .gemini(&key)
        .upload_file(upload.bytes, &display_name, &upload.mime_type)
        .await?;
    info!("Uploaded {} to Gemini as {}", display_name, file.name);
    Ok(Json(file.to_record()))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let key = api_key(&headers)?;
    state.dispatcher.gemini(&key).delete_file(&id).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}
