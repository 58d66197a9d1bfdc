//! Gateway configuration from environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_SESSION_CAPACITY: usize = 1024;
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Top-level gateway configuration. Never holds credentials; those arrive per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server port.
    pub port: u16,
    /// OpenAI API root, including the `/v1` segment.
    pub openai_base_url: String,
    /// Gemini API root (without version segment).
    pub gemini_base_url: String,
    pub default_gemini_model: String,
    /// Also used as the model of newly created assistants.
    pub default_openai_model: String,
    /// Delay between ingestion status polls.
    pub ingest_poll_interval: Duration,
    pub ingest_max_attempts: u32,
    /// Overall ingestion deadline.
    pub ingest_timeout: Duration,
    /// Request body limit on document upload routes.
    pub max_upload_bytes: usize,
    /// Most provisioning sessions remembered at once.
    pub session_capacity: usize,
    /// Idle time after which a provisioning session is forgotten.
    pub session_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            default_gemini_model: DEFAULT_GEMINI_MODEL.into(),
            default_openai_model: DEFAULT_OPENAI_MODEL.into(),
            ingest_poll_interval: Duration::from_millis(1000),
            ingest_max_attempts: 120,
            ingest_timeout: Duration::from_secs(300),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl GatewayConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let poll_ms = parse_or(
            &lookup,
            "RAGWAY_INGEST_POLL_MS",
            defaults.ingest_poll_interval.as_millis() as u64,
        )?;
        let max_attempts = parse_or(
            &lookup,
            "RAGWAY_INGEST_MAX_ATTEMPTS",
            defaults.ingest_max_attempts,
        )?;
        let timeout_secs = parse_or(
            &lookup,
            "RAGWAY_INGEST_TIMEOUT_SECS",
            defaults.ingest_timeout.as_secs(),
        )?;
        let max_upload_bytes = parse_or(
            &lookup,
            "RAGWAY_MAX_UPLOAD_BYTES",
            defaults.max_upload_bytes,
        )?;
        let session_capacity = parse_or(
            &lookup,
            "RAGWAY_SESSION_CAPACITY",
            defaults.session_capacity,
        )?;
        let session_ttl_secs = parse_or(
            &lookup,
            "RAGWAY_SESSION_TTL_SECS",
            defaults.session_ttl.as_secs(),
        )?;

        Ok(Self {
            port,
            openai_base_url: lookup("RAGWAY_OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            gemini_base_url: lookup("RAGWAY_GEMINI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_base_url),
            default_gemini_model: lookup("RAGWAY_DEFAULT_GEMINI_MODEL")
                .unwrap_or(defaults.default_gemini_model),
            default_openai_model: lookup("RAGWAY_DEFAULT_OPENAI_MODEL")
                .unwrap_or(defaults.default_openai_model),
            ingest_poll_interval: Duration::from_millis(poll_ms),
            ingest_max_attempts: max_attempts,
            ingest_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes,
            session_capacity,
            session_ttl: Duration::from_secs(session_ttl_secs),
        })
    }

    /// Fixed-interval ingestion polling bounded by attempts and the overall deadline.
    pub fn ingest_policy(&self) -> RetryPolicy {
        RetryPolicy {
            deadline: Some(self.ingest_timeout),
            ..RetryPolicy::fixed(self.ingest_poll_interval, self.ingest_max_attempts)
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, raw))),
        None => Ok(default),
    }
}
