//! Provider selection for a chat turn.

use std::sync::Arc;

use tracing::{info, warn};

use ragway_core::{Error, GatewayConfig, Result};

use crate::adapter::{Adapter, FrameStream};
use crate::gemini::{GeminiAdapter, GeminiApi, GeminiClient};
use crate::openai::{AssistantRunAdapter, CompletionAdapter, OpenAiApi, OpenAiClient};
use crate::types::{ChatRequest, Provider};

/// Which adapter serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Gemini,
    AssistantRun,
    Completion,
}

/// Pick the adapter from the provider tag and assistant handle alone.
pub fn route(request: &ChatRequest) -> Route {
    match request.provider() {
        Provider::Gemini => Route::Gemini,
        Provider::OpenAI if request.assistant_id().is_some() => Route::AssistantRun,
        Provider::OpenAI => Route::Completion,
    }
}

/// Vendor APIs bound to the request's credential.
#[derive(Clone)]
pub struct Vendors {
    pub openai: Arc<dyn OpenAiApi>,
    pub gemini: Arc<dyn GeminiApi>,
    pub gemini_model: String,
    pub openai_model: String,
}

/// Run one chat turn.
///
/// An empty credential is rejected before any vendor is contacted. An
/// assistant the vendor no longer knows degrades to a plain completion; the
/// run adapter checks the assistant before creating or appending to a thread,
/// so the fallback leaves no unanswered turn behind.
pub async fn dispatch(request: ChatRequest, vendors: &Vendors) -> Result<FrameStream> {
    if request.api_key.trim().is_empty() {
        return Err(Error::MissingCredential);
    }

    let route = route(&request);
    let adapter = match route {
        Route::Gemini => Adapter::Gemini(GeminiAdapter::new(
            vendors.gemini.clone(),
            request.model().unwrap_or(vendors.gemini_model.as_str()),
        )),
        Route::AssistantRun => Adapter::AssistantRun(AssistantRunAdapter::new(
            vendors.openai.clone(),
            request.assistant_id().unwrap_or_default(),
            request.thread_id().map(str::to_string),
            request.model().unwrap_or(vendors.openai_model.as_str()),
        )),
        Route::Completion => Adapter::Completion(completion(&request, vendors)),
    };
    info!(
        "Dispatching {} message(s) to {}",
        request.messages.len(),
        adapter.name()
    );

    if route != Route::AssistantRun {
        return adapter.open(request.messages).await;
    }
    match adapter.open(request.messages.clone()).await {
        Err(e) if e.is_not_found() => {
            warn!("Assistant unavailable ({}), answering with a plain completion", e);
            completion(&request, vendors).open(request.messages).await
        }
        other => other,
    }
}

fn completion(request: &ChatRequest, vendors: &Vendors) -> CompletionAdapter {
    CompletionAdapter::new(
        vendors.openai.clone(),
        request.model().unwrap_or(vendors.openai_model.as_str()),
    )
}

/// Builds HTTP vendor clients per request from shared configuration.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl Dispatcher {
    pub fn new(http: reqwest::Client, config: GatewayConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn openai(&self, api_key: &str) -> Arc<dyn OpenAiApi> {
        Arc::new(OpenAiClient::new(
            self.http.clone(),
            &self.config.openai_base_url,
            api_key,
        ))
    }

    pub fn gemini(&self, api_key: &str) -> Arc<dyn GeminiApi> {
        Arc::new(GeminiClient::new(
            self.http.clone(),
            &self.config.gemini_base_url,
            api_key,
        ))
    }

    pub fn vendors(&self, api_key: &str) -> Vendors {
        Vendors {
            openai: self.openai(api_key),
            gemini: self.gemini(api_key),
            gemini_model: self.config.default_gemini_model.clone(),
            openai_model: self.config.default_openai_model.clone(),
        }
    }

    pub async fn open(&self, request: ChatRequest) -> Result<FrameStream> {
        let vendors = self.vendors(&request.api_key);
        dispatch(request, &vendors).await
    }
}
