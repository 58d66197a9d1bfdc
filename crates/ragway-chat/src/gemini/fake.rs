//! In-memory Gemini used by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use ragway_core::{Error, Result};

use super::*;
use crate::adapter::VendorStream;
use crate::openai::fake::{scripted, Scripted};

#[derive(Default)]
pub(crate) struct FakeGeminiState {
    next_id: u32,
    pub files: Vec<GeminiFile>,
    pub fail_listing: bool,
    pub script: Vec<Scripted<GenerateChunk>>,
    pub requests: Vec<(String, GenerateRequest)>,
}

#[derive(Default)]
pub(crate) struct FakeGemini {
    pub state: Mutex<FakeGeminiState>,
}

impl FakeGemini {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeminiApi for FakeGemini {
    async fn list_files(&self) -> Result<Vec<GeminiFile>> {
        let state = self.state.lock();
        if state.fail_listing {
            return Err(Error::Transport("listing unavailable".into()));
        }
        Ok(state.files.clone())
    }

    async fn upload_file(
        &self,
        _bytes: Vec<u8>,
        display_name: &str,
        mime_type: &str,
    ) -> Result<GeminiFile> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let file = GeminiFile {
            name: format!("files/f{}", state.next_id),
            display_name: display_name.to_string(),
            mime_type: mime_type.to_string(),
            uri: format!("https://example/files/f{}", state.next_id),
            state: STATE_ACTIVE.to_string(),
            create_time: "2024-05-01T10:00:00Z".into(),
        };
        state.files.push(file.clone());
        Ok(file)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.files.len();
        state.files.retain(|f| f.name != name && f.id() != name);
        if state.files.len() == before {
            return Err(Error::ResourceNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn stream_generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<VendorStream<GenerateChunk>> {
        let mut state = self.state.lock();
        state.requests.push((model.to_string(), request.clone()));
        Ok(scripted(state.script.clone()))
    }
}
