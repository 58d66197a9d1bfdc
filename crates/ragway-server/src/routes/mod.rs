//! HTTP route handlers.

pub mod chat;
pub mod gemini;
pub mod health;
pub mod keys;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Multipart;
use axum::http::HeaderMap;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ragway_core::Error;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying the vendor credential on document management routes.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_upload = state.config().max_upload_bytes;
    Router::new()
        .nest("/api", api_routes(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes(max_upload: usize) -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(chat::routes())
        .merge(keys::routes())
        .merge(openai::routes(max_upload))
        .merge(gemini::routes(max_upload))
}

/// The credential from [`API_KEY_HEADER`]; absent or blank is `MissingCredential`.
pub(crate) fn api_key(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::MissingCredential.into())
}

/// A multipart upload: one `file` part plus any text fields.
pub(crate) struct Upload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub fields: HashMap<String, String>,
}

impl Upload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

pub(crate) async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut file: Option<(Vec<u8>, String, String)> = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await?;
            file = Some((bytes.to_vec(), file_name, mime_type));
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    let (bytes, file_name, mime_type) =
        file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request(format!("{} is empty", file_name)));
    }
    Ok(Upload {
        bytes,
        file_name,
        mime_type,
        fields,
    })
}
