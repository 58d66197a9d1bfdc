//! Assistant / vector store lifecycle and file ingestion.
//!
//! Handles held by the client are opaque and may be stale. A vendor
//! "not found" on retrieval is the normal signal to recreate, never an error
//! for the caller.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use ragway_core::{Error, Result, RetryPolicy};

use super::{AssistantSpec, OpenAiApi, STATUS_COMPLETED, STATUS_IN_PROGRESS};
use crate::prompts::{ASSISTANT_INSTRUCTIONS, ASSISTANT_NAME, VECTOR_STORE_NAME};
use crate::types::{non_empty, unix_to_rfc3339, AssistantResources, DocumentRecord};

/// Placeholder name when a listed file's metadata cannot be fetched.
pub const UNKNOWN_FILE_NAME: &str = "Unknown file";

/// Manages the vendor-side assistant, its vector store, and their files.
pub struct ResourceManager {
    api: Arc<dyn OpenAiApi>,
    assistant_model: String,
}

impl ResourceManager {
    pub fn new(api: Arc<dyn OpenAiApi>, assistant_model: impl Into<String>) -> Self {
        Self {
            api,
            assistant_model: assistant_model.into(),
        }
    }

    /// Resolve (or create) the assistant and its single vector store.
    pub async fn ensure(
        &self,
        assistant_id: Option<&str>,
        vector_store_id: Option<&str>,
    ) -> Result<AssistantResources> {
        let assistant_id = non_empty(assistant_id);
        let vector_store_id = non_empty(vector_store_id);

        let existing = match assistant_id {
            Some(id) => match self.api.retrieve_assistant(id).await {
                Ok(assistant) => Some(assistant),
                Err(e) if e.is_not_found() => {
                    info!("Assistant {} no longer exists, recreating", id);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        if let Some(assistant) = existing {
            if let Some(vs) = vector_store_id {
                return Ok(AssistantResources {
                    assistant_id: assistant.id,
                    vector_store_id: vs.to_string(),
                });
            }
            if let Some(vs) = assistant.vector_store_id() {
                debug!("Assistant {} already has vector store {}", assistant.id, vs);
                return Ok(AssistantResources {
                    assistant_id: assistant.id.clone(),
                    vector_store_id: vs.to_string(),
                });
            }

            let store = self.api.create_vector_store(VECTOR_STORE_NAME).await?;
            self.api
                .attach_vector_store(&assistant.id, &store.id)
                .await?;
            info!(
                "Attached new vector store {} to assistant {}",
                store.id, assistant.id
            );
            return Ok(AssistantResources {
                assistant_id: assistant.id,
                vector_store_id: store.id,
            });
        }

        let store = self.api.create_vector_store(VECTOR_STORE_NAME).await?;
        let spec = AssistantSpec {
            name: ASSISTANT_NAME.to_string(),
            instructions: ASSISTANT_INSTRUCTIONS.to_string(),
            model: self.assistant_model.clone(),
        };
        let assistant = self.api.create_assistant(&spec, &store.id).await?;
        info!(
            "Created assistant {} with vector store {}",
            assistant.id, store.id
        );

        Ok(AssistantResources {
            assistant_id: assistant.id,
            vector_store_id: store.id,
        })
    }

    /// Upload a file, attach it to the vector store, and wait until it is searchable.
    ///
    /// Returns the vendor file id once the attachment reports `completed`.
    /// When attaching or waiting fails, the uploaded file is removed again.
    pub async fn ingest(
        &self,
        vector_store_id: &str,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        policy: &RetryPolicy,
    ) -> Result<String> {
        let size = bytes.len();
        let file = self.api.upload_file(bytes, file_name, mime_type).await?;
        info!("Uploaded {} ({} bytes) as {}", file_name, size, file.id);

        match self.attach_and_wait(vector_store_id, &file.id, policy).await {
            Ok(()) => {
                info!("File {} ready in vector store {}", file.id, vector_store_id);
                Ok(file.id)
            }
            Err(e) => {
                self.discard_upload(vector_store_id, &file.id).await;
                Err(e)
            }
        }
    }

    async fn attach_and_wait(
        &self,
        vector_store_id: &str,
        file_id: &str,
        policy: &RetryPolicy,
    ) -> Result<()> {
        let attached = self
            .api
            .add_vector_store_file(vector_store_id, file_id)
            .await?;
        let mut status = attached.status;

        let started = Instant::now();
        let mut attempt = 0u32;
        while status == STATUS_IN_PROGRESS {
            let out_of_time = policy
                .deadline
                .map(|deadline| started.elapsed() >= deadline)
                .unwrap_or(false);
            if attempt >= policy.max_attempts || out_of_time {
                warn!(
                    "Gave up waiting for {} after {} polls ({:?})",
                    file_id,
                    attempt,
                    started.elapsed()
                );
                return Err(Error::IngestionTimeout { status });
            }

            tokio::time::sleep(policy.delay_for(attempt)).await;
            attempt += 1;
            status = self
                .api
                .get_vector_store_file(vector_store_id, file_id)
                .await?
                .status;
            debug!("Ingestion of {}: {} (poll {})", file_id, status, attempt);
        }

        if status == STATUS_COMPLETED {
            Ok(())
        } else {
            warn!("File {} ended ingestion as {}", file_id, status);
            Err(Error::IngestionFailed { status })
        }
    }

    /// Best-effort cleanup of a file whose ingestion did not succeed.
    async fn discard_upload(&self, vector_store_id: &str, file_id: &str) {
        if let Err(e) = self
            .api
            .remove_vector_store_file(vector_store_id, file_id)
            .await
        {
            debug!("Detach of {} after failed ingestion: {}", file_id, e);
        }
        match self.api.delete_file(file_id).await {
            Ok(()) => info!("Deleted {} after failed ingestion", file_id),
            Err(e) => warn!("Could not delete {} after failed ingestion: {}", file_id, e),
        }
    }

    /// Files attached to a vector store, with names resolved.
    pub async fn list_files(&self, vector_store_id: &str) -> Result<Vec<DocumentRecord>> {
        let attached = self.api.list_vector_store_files(vector_store_id).await?;
        let mut records = Vec::with_capacity(attached.len());

        for entry in attached {
            let name = match self.api.retrieve_file(&entry.id).await {
                Ok(file) if !file.filename.is_empty() => file.filename,
                Ok(_) => UNKNOWN_FILE_NAME.to_string(),
                Err(e) => {
                    warn!("No metadata for file {}: {}", entry.id, e);
                    UNKNOWN_FILE_NAME.to_string()
                }
            };
            records.push(DocumentRecord {
                id: entry.id,
                name,
                status: entry.status,
                created_at: unix_to_rfc3339(entry.created_at),
            });
        }

        Ok(records)
    }

    /// Detach a file from the vector store, then delete the file object.
    pub async fn remove_file(&self, vector_store_id: &str, file_id: &str) -> Result<()> {
        self.api
            .remove_vector_store_file(vector_store_id, file_id)
            .await?;
        self.api.delete_file(file_id).await?;
        info!("Removed file {} from vector store {}", file_id, vector_store_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::fake::FakeOpenAi;
    use std::time::Duration;

    fn manager() -> (Arc<FakeOpenAi>, ResourceManager) {
        let fake = Arc::new(FakeOpenAi::new());
        let manager = ResourceManager::new(fake.clone(), "gpt-4o-mini");
        (fake, manager)
    }

    fn quick_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_millis(1), attempts)
    }

    #[tokio::test]
    async fn test_ensure_creates_then_reuses() {
        let (fake, manager) = manager();

        let first = manager.ensure(None, None).await.unwrap();
        assert_eq!(fake.assistant_count(), 1);
        assert_eq!(fake.vector_store_count(), 1);

        let again = manager
            .ensure(Some(first.assistant_id.as_str()), Some(first.vector_store_id.as_str()))
            .await
            .unwrap();
        assert_eq!(again, first);

        // Only the assistant handle: store comes from the assistant itself.
        let from_assistant = manager
            .ensure(Some(first.assistant_id.as_str()), None)
            .await
            .unwrap();
        assert_eq!(from_assistant, first);

        assert_eq!(fake.assistant_count(), 1);
        assert_eq!(fake.vector_store_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_heals_deleted_assistant() {
        let (fake, manager) = manager();
        let resolved = manager
            .ensure(Some("asst_deleted"), Some("vs_stale"))
            .await
            .unwrap();
        assert_ne!(resolved.assistant_id, "asst_deleted");
        assert_ne!(resolved.vector_store_id, "vs_stale");
        assert_eq!(fake.assistant_count(), 1);
        assert_eq!(fake.vector_store_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_attaches_store_to_bare_assistant() {
        let (fake, manager) = manager();
        fake.with_bare_assistant("asst_bare");

        let resolved = manager.ensure(Some("asst_bare"), None).await.unwrap();
        assert_eq!(resolved.assistant_id, "asst_bare");

        // The attachment is persisted: a later retrieval sees the same store.
        let again = manager.ensure(Some("asst_bare"), None).await.unwrap();
        assert_eq!(again, resolved);
        assert_eq!(fake.vector_store_count(), 1);
        assert!(fake
            .state
            .lock()
            .calls
            .iter()
            .any(|c| c.starts_with("attach_vector_store:asst_bare")));
    }

    #[tokio::test]
    async fn test_ensure_blank_handles_are_absent() {
        let (fake, manager) = manager();
        manager.ensure(Some(""), Some("  ")).await.unwrap();
        assert_eq!(fake.assistant_count(), 1);
    }

    #[tokio::test]
    async fn test_ingest_completes_after_polling() {
        let (fake, manager) = manager();
        {
            let mut state = fake.state.lock();
            state.poll_statuses =
                ["in_progress", "in_progress", "completed"].iter().map(|s| s.to_string()).collect();
        }
        let file_id = manager
            .ingest("vs_1", b"hello".to_vec(), "notes.txt", "text/plain", &quick_policy(10))
            .await
            .unwrap();
        assert!(file_id.starts_with("file_"));
        assert_eq!(fake.state.lock().polls, 3);
    }

    #[tokio::test]
    async fn test_ingest_failed_status() {
        let (fake, manager) = manager();
        {
            let mut state = fake.state.lock();
            state.poll_statuses = ["in_progress", "failed"].iter().map(|s| s.to_string()).collect();
        }
        let err = manager
            .ingest("vs_1", b"x".to_vec(), "bad.pdf", "application/pdf", &quick_policy(10))
            .await
            .unwrap_err();
        match err {
            Error::IngestionFailed { status } => assert_eq!(status, "failed"),
            other => panic!("unexpected: {other:?}"),
        }
        let state = fake.state.lock();
        assert!(state.files.is_empty());
        assert!(state.store_files["vs_1"].is_empty());
    }

    #[tokio::test]
    async fn test_ingest_gives_up_after_max_attempts() {
        let (fake, manager) = manager();
        fake.state.lock().poll_statuses = ["in_progress"].iter().map(|s| s.to_string()).collect();
        let err = manager
            .ingest("vs_1", b"x".to_vec(), "slow.txt", "text/plain", &quick_policy(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IngestionTimeout { .. }));
        assert_eq!(fake.state.lock().polls, 3);
        assert!(fake.state.lock().files.is_empty());
    }

    #[tokio::test]
    async fn test_list_with_missing_metadata() {
        let (fake, manager) = manager();
        manager
            .ingest("vs_1", b"a".to_vec(), "a.txt", "text/plain", &quick_policy(1))
            .await
            .unwrap();
        let orphan = manager
            .ingest("vs_1", b"b".to_vec(), "b.txt", "text/plain", &quick_policy(1))
            .await
            .unwrap();
        fake.state.lock().files.remove(&orphan);

        let files = manager.list_files("vs_1").await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.txt");
        assert_eq!(files[0].status, "completed");
        assert!(!files[0].created_at.is_empty());
        assert_eq!(files[1].name, UNKNOWN_FILE_NAME);
    }

    #[tokio::test]
    async fn test_remove_detaches_before_delete() {
        let (fake, manager) = manager();
        let file_id = manager
            .ingest("vs_1", b"a".to_vec(), "a.txt", "text/plain", &quick_policy(1))
            .await
            .unwrap();
        manager.remove_file("vs_1", &file_id).await.unwrap();

        let calls = fake.state.lock().calls.clone();
        let detach = calls
            .iter()
            .position(|c| c == &format!("remove_vector_store_file:vs_1:{}", file_id))
            .unwrap();
        let delete = calls
            .iter()
            .position(|c| c == &format!("delete_file:{}", file_id))
            .unwrap();
        assert!(detach < delete);
        assert!(manager.list_files("vs_1").await.unwrap().is_empty());
    }
}
