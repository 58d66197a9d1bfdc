//! Ragway Core — shared error taxonomy and gateway configuration.

pub mod config;
pub mod error;
pub mod retry;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use retry::RetryPolicy;
