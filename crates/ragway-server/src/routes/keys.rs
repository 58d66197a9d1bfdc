use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use ragway_chat::keys::{validate_key, KeyStatus};
use ragway_chat::Provider;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/keys/validate", post(validate))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    api_key: String,
}

/// POST /api/keys/validate — a throttled key still counts as valid.
async fn validate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> ApiResult<Json<KeyStatus>> {
    let Json(req) = payload?;
    let provider = Provider::from_tag(req.provider.as_deref());
    let status = validate_key(
        state.dispatcher.http(),
        state.config(),
        provider,
        &req.api_key,
    )
    .await?;
    Ok(Json(status))
}
