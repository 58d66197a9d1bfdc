//! OpenAI assistant provisioning and vector store document management.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use ragway_chat::openai::session_key;
use ragway_chat::AssistantResources;

use super::{api_key, read_upload};
use crate::error::ApiResult;
use crate::state::AppState;

/// Upload bodies are capped at `max_upload` bytes.
pub fn routes(max_upload: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/openai/assistant", post(ensure_assistant))
        .route(
            "/openai/files",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/openai/vector-stores/{id}/files", get(list_files))
        .route("/openai/vector-stores/{id}/files/{file_id}", delete(remove_file))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnsureRequest {
    #[serde(default)]
    assistant_id: Option<String>,
    #[serde(default)]
    vector_store_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// POST /api/openai/assistant — resolve (creating or healing) the assistant pair.
async fn ensure_assistant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<EnsureRequest>, JsonRejection>,
) -> ApiResult<Json<AssistantResources>> {
    let key = api_key(&headers)?;
    let Json(req) = payload?;

    let resources = state
        .sessions
        .ensure(
            &session_key(&key, req.session_id.as_deref()),
            &state.resources(&key),
            req.assistant_id.as_deref(),
            req.vector_store_id.as_deref(),
        )
        .await?;
    Ok(Json(resources))
}

/// POST /api/openai/files — upload into the session's vector store and wait
/// until the file is searchable.
async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let key = api_key(&headers)?;
    let upload = read_upload(multipart).await?;

    let manager = state.resources(&key);
    let resources = state
        .sessions
        .ensure(
            &session_key(&key, upload.field("sessionId")),
            &manager,
            upload.field("assistantId"),
            upload.field("vectorStoreId"),
        )
        .await?;

    info!(
        "Ingesting {} ({}) into {}",
        upload.file_name, upload.mime_type, resources.vector_store_id
    );
    let policy = state.config().ingest_policy();
    let file_id = manager
        .ingest(
            &resources.vector_store_id,
            upload.bytes,
            &upload.file_name,
            &upload.mime_type,
            &policy,
        )
        .await?;

    Ok(Json(json!({
        "fileId": file_id,
        "assistantId": resources.assistant_id,
        "vectorStoreId": resources.vector_store_id,
    })))
}

/// GET /api/openai/vector-stores/{id}/files
async fn list_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(vector_store_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let key = api_key(&headers)?;
    let files = state.resources(&key).list_files(&vector_store_id).await?;
    Ok(Json(json!({ "files": files })))
}

/// DELETE /api/openai/vector-stores/{id}/files/{file_id}
async fn remove_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((vector_store_id, file_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let key = api_key(&headers)?;
    state
        .resources(&key)
        .remove_file(&vector_store_id, &file_id)
        .await?;
    Ok(Json(json!({ "deleted": true, "fileId": file_id })))
}
