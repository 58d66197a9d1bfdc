//! In-memory OpenAI used by unit tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use ragway_core::{Error, Result};

use super::*;
use crate::adapter::VendorStream;

/// Scripted stream item.
#[derive(Debug, Clone)]
pub(crate) enum Scripted<T> {
    Item(T),
    Fail(String),
}

#[derive(Default)]
pub(crate) struct FakeState {
    next_id: u32,
    pub assistants: HashMap<String, Assistant>,
    pub vector_stores: Vec<String>,
    pub files: HashMap<String, FileObject>,
    pub store_files: HashMap<String, Vec<VectorStoreFile>>,
    /// Statuses returned by successive polls; the last one repeats.
    pub poll_statuses: VecDeque<String>,
    pub polls: u32,
    pub threads: HashMap<String, Vec<String>>,
    pub run_script: Vec<Scripted<RunEvent>>,
    pub completion_script: Vec<Scripted<CompletionChunk>>,
    pub completion_requests: Vec<(String, Vec<CompletionMessage>)>,
    /// Ordered log of mutating calls.
    pub calls: Vec<String>,
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }
}

#[derive(Default)]
pub(crate) struct FakeOpenAi {
    pub state: Mutex<FakeState>,
}

impl FakeOpenAi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assistant_count(&self) -> usize {
        self.state.lock().assistants.len()
    }

    pub fn vector_store_count(&self) -> usize {
        self.state.lock().vector_stores.len()
    }

    pub fn thread_messages(&self, thread_id: &str) -> Vec<String> {
        self.state
            .lock()
            .threads
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Insert an existing thread.
    pub fn with_thread(&self, thread_id: &str) {
        self.state
            .lock()
            .threads
            .insert(thread_id.to_string(), Vec::new());
    }

    /// Insert an assistant with no tool resources.
    pub fn with_bare_assistant(&self, assistant_id: &str) {
        self.state.lock().assistants.insert(
            assistant_id.to_string(),
            Assistant {
                id: assistant_id.to_string(),
                tool_resources: None,
            },
        );
    }
}

fn assistant_with_store(id: &str, vector_store_id: &str) -> Assistant {
    Assistant {
        id: id.to_string(),
        tool_resources: Some(ToolResources {
            file_search: Some(FileSearchResources {
                vector_store_ids: vec![vector_store_id.to_string()],
            }),
        }),
    }
}

pub(crate) fn scripted<T: Send + 'static>(script: Vec<Scripted<T>>) -> VendorStream<T> {
    let items: Vec<Result<T>> = script
        .into_iter()
        .map(|s| match s {
            Scripted::Item(item) => Ok(item),
            Scripted::Fail(reason) => Err(Error::Transport(reason)),
        })
        .collect();
    Box::pin(futures::stream::iter(items))
}

#[async_trait]
impl OpenAiApi for FakeOpenAi {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.state
            .lock()
            .assistants
            .get(assistant_id)
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound(format!("assistant {}", assistant_id)))
    }

    async fn create_assistant(
        &self,
        spec: &AssistantSpec,
        vector_store_id: &str,
    ) -> Result<Assistant> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let id = state.id("asst");
        let assistant = assistant_with_store(&id, vector_store_id);
        state.assistants.insert(id.clone(), assistant.clone());
        state.calls.push(format!("create_assistant:{}:{}", spec.model, vector_store_id));
        Ok(assistant)
    }

    async fn attach_vector_store(
        &self,
        assistant_id: &str,
        vector_store_id: &str,
    ) -> Result<Assistant> {
        let mut state = self.state.lock();
        if !state.assistants.contains_key(assistant_id) {
            return Err(Error::ResourceNotFound(assistant_id.to_string()));
        }
        let assistant = assistant_with_store(assistant_id, vector_store_id);
        state
            .assistants
            .insert(assistant_id.to_string(), assistant.clone());
        state
            .calls
            .push(format!("attach_vector_store:{}:{}", assistant_id, vector_store_id));
        Ok(assistant)
    }

    async fn create_vector_store(&self, _name: &str) -> Result<VectorStore> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let id = state.id("vs");
        state.vector_stores.push(id.clone());
        state.calls.push(format!("create_vector_store:{}", id));
        Ok(VectorStore { id })
    }

    async fn upload_file(
        &self,
        _bytes: Vec<u8>,
        file_name: &str,
        _mime_type: &str,
    ) -> Result<FileObject> {
        let mut state = self.state.lock();
        let id = state.id("file");
        let file = FileObject {
            id: id.clone(),
            filename: file_name.to_string(),
            created_at: 1_700_000_000,
        };
        state.files.insert(id.clone(), file.clone());
        state.calls.push(format!("upload_file:{}", file_name));
        Ok(file)
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject> {
        self.state
            .lock()
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound(format!("file {}", file_id)))
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.files.remove(file_id);
        state.calls.push(format!("delete_file:{}", file_id));
        Ok(())
    }

    async fn add_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile> {
        let mut state = self.state.lock();
        let status = if state.poll_statuses.is_empty() {
            STATUS_COMPLETED.to_string()
        } else {
            STATUS_IN_PROGRESS.to_string()
        };
        let attached = VectorStoreFile {
            id: file_id.to_string(),
            status,
            created_at: 1_700_000_000,
        };
        state
            .store_files
            .entry(vector_store_id.to_string())
            .or_default()
            .push(attached.clone());
        state
            .calls
            .push(format!("add_vector_store_file:{}:{}", vector_store_id, file_id));
        Ok(attached)
    }

    async fn get_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile> {
        let mut state = self.state.lock();
        state.polls += 1;
        let next = if state.poll_statuses.len() > 1 {
            state.poll_statuses.pop_front()
        } else {
            state.poll_statuses.front().cloned()
        };
        let status = next.unwrap_or_else(|| STATUS_COMPLETED.to_string());
        let file = state
            .store_files
            .get_mut(vector_store_id)
            .and_then(|files| files.iter_mut().find(|f| f.id == file_id))
            .ok_or_else(|| Error::ResourceNotFound(file_id.to_string()))?;
        file.status = status;
        Ok(file.clone())
    }

    async fn list_vector_store_files(&self, vector_store_id: &str) -> Result<Vec<VectorStoreFile>> {
        Ok(self
            .state
            .lock()
            .store_files
            .get(vector_store_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_vector_store_file(&self, vector_store_id: &str, file_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(files) = state.store_files.get_mut(vector_store_id) {
            files.retain(|f| f.id != file_id);
        }
        state
            .calls
            .push(format!("remove_vector_store_file:{}:{}", vector_store_id, file_id));
        Ok(())
    }

    async fn create_thread(&self) -> Result<Thread> {
        let mut state = self.state.lock();
        let id = state.id("thread");
        state.threads.insert(id.clone(), Vec::new());
        state.calls.push(format!("create_thread:{}", id));
        Ok(Thread { id })
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<()> {
        let mut state = self.state.lock();
        let messages = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| Error::ResourceNotFound(format!("thread {}", thread_id)))?;
        messages.push(content.to_string());
        Ok(())
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<VendorStream<RunEvent>> {
        let state = self.state.lock();
        if !state.assistants.contains_key(assistant_id) {
            return Err(Error::ResourceNotFound(format!("assistant {}", assistant_id)));
        }
        if !state.threads.contains_key(thread_id) {
            return Err(Error::ResourceNotFound(format!("thread {}", thread_id)));
        }
        Ok(scripted(state.run_script.clone()))
    }

    async fn stream_completion(
        &self,
        model: &str,
        messages: &[CompletionMessage],
    ) -> Result<VendorStream<CompletionChunk>> {
        let mut state = self.state.lock();
        state
            .completion_requests
            .push((model.to_string(), messages.to_vec()));
        Ok(scripted(state.completion_script.clone()))
    }
}
