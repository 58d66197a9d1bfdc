//! Credential checks against the vendor model listing.

use reqwest::StatusCode;
use serde::Serialize;
use tracing::info;

use ragway_core::{Error, GatewayConfig, Result};

use crate::http::{transport, upstream_error};
use crate::types::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub valid: bool,
    /// Valid, but the vendor is currently rate limiting it.
    pub throttled: bool,
}

/// Check `key` with an authenticated model listing.
pub async fn validate_key(
    http: &reqwest::Client,
    config: &GatewayConfig,
    provider: Provider,
    key: &str,
) -> Result<KeyStatus> {
    if key.trim().is_empty() {
        return Err(Error::MissingCredential);
    }
    let builder = match provider {
        Provider::OpenAI => http
            .get(format!("{}/models", config.openai_base_url))
            .bearer_auth(key),
        Provider::Gemini => http
            .get(format!("{}/v1beta/models", config.gemini_base_url))
            .query(&[("pageSize", "1")])
            .header("x-goog-api-key", key),
    };
    let response = builder.send().await.map_err(transport)?;
    let status = response.status();
    let body = if status.is_success() {
        String::new()
    } else {
        response.text().await.unwrap_or_default()
    };
    let result = classify_key_status(status, &body);
    info!("Validated {} key: {:?}", provider, result.as_ref().ok());
    result
}

/// 2xx and 429 both prove the key authenticates.
pub fn classify_key_status(status: StatusCode, body: &str) -> Result<KeyStatus> {
    if status.is_success() {
        return Ok(KeyStatus {
            valid: true,
            throttled: false,
        });
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Ok(KeyStatus {
            valid: true,
            throttled: true,
        });
    }
    Err(upstream_error(status.as_u16(), body))
}
