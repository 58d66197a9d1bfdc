//! Streaming chat: `POST /api/chat` answers with a line-framed text body.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio_stream::StreamExt;
use tracing::{debug, info};

use ragway_chat::ChatRequest;
use ragway_protocol::StreamFrame;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// Vendor failures before the first frame are answered as plain HTTP errors;
/// once streaming has begun they arrive as the terminal error frame.
async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    info!(
        "Chat turn: provider={} messages={}",
        request.provider(),
        request.messages.len()
    );

    let frames = state.dispatcher.open(request).await?;
    let body = frames.map(|frame: StreamFrame| {
        if frame.is_terminal() {
            debug!("Terminal frame: {:?}", frame);
        }
        Ok::<_, Infallible>(frame.encode())
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
