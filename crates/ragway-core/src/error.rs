//! Error types for Ragway.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No API key supplied")]
    MissingCredential,

    #[error("Invalid API key, check your key: {0}")]
    InvalidCredential(String),

    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("File ingestion failed with status: {status}")]
    IngestionFailed { status: String },

    #[error("File ingestion did not finish in time (last status: {status})")]
    IngestionTimeout { status: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify a non-success vendor HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 | 403 => Error::InvalidCredential(message),
            404 => Error::ResourceNotFound(message),
            429 => Error::RateLimited(message),
            _ => Error::Upstream { status, message },
        }
    }

    /// Whether this is a stale-handle error that callers recover from locally.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ResourceNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(Error::from_status(401, "x"), Error::InvalidCredential(_)));
        assert!(matches!(Error::from_status(403, "x"), Error::InvalidCredential(_)));
        assert!(Error::from_status(404, "gone").is_not_found());
        assert!(matches!(Error::from_status(429, "slow"), Error::RateLimited(_)));
        match Error::from_status(502, "bad gateway") {
            Error::Upstream { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_ingestion_failed_carries_status() {
        let err = Error::IngestionFailed { status: "failed".into() };
        assert!(err.to_string().contains("failed"));
    }
}
