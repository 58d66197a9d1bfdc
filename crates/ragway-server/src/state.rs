//! Shared application state.

use ragway_chat::openai::{ResourceManager, SessionRegistry};
use ragway_chat::Dispatcher;
use ragway_core::GatewayConfig;

/// Shared application state accessible from all route handlers.
///
/// Holds no credentials: every vendor client is built from the key carried
/// by the request being served.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: GatewayConfig, http: reqwest::Client) -> Self {
        let sessions = SessionRegistry::with_limits(config.session_capacity, config.session_ttl);
        Self {
            dispatcher: Dispatcher::new(http, config),
            sessions,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        self.dispatcher.config()
    }

    /// Assistant lifecycle manager bound to `api_key`.
    pub fn resources(&self, api_key: &str) -> ResourceManager {
        ResourceManager::new(
            self.dispatcher.openai(api_key),
            self.config().default_openai_model.clone(),
        )
    }
}
