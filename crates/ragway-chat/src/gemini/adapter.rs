//! Document-grounded Gemini chat.

use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::{info, warn};

use ragway_core::{Error, Result};
use ragway_protocol::message::last_user_index;
use ragway_protocol::{ChatMessage, Role, StreamFrame, UsageSummary};

use super::{Content, FileData, GeminiApi, GeminiFile, GenerateRequest, Part, UsageMetadata};
use crate::adapter::FrameStream;
use crate::prompts::{gemini_system_instruction, GROUNDING_ACK, GROUNDING_TURN};

pub struct GeminiAdapter {
    api: Arc<dyn GeminiApi>,
    model: String,
}

impl GeminiAdapter {
    pub fn new(api: Arc<dyn GeminiApi>, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
        }
    }

    pub async fn open(self, history: Vec<ChatMessage>) -> Result<FrameStream> {
        let documents: Vec<GeminiFile> = match self.api.list_files().await {
            Ok(files) => files.into_iter().filter(GeminiFile::is_active).collect(),
            Err(e) => {
                warn!("Document listing failed, answering without grounding: {}", e);
                Vec::new()
            }
        };
        let request = build_request(&documents, &history)?;
        info!(
            "Grounding Gemini turn on {} active document(s) with {}",
            documents.len(),
            self.model
        );

        let mut chunks = self.api.stream_generate(&self.model, &request).await?;
        let model = self.model;
        Ok(Box::pin(async_stream::stream! {
            let mut latest: Option<UsageMetadata> = None;
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => {
                        let text = chunk.text();
                        if !text.is_empty() {
                            yield StreamFrame::TextDelta(text);
                        }
                        // Counts are cumulative; keep the newest.
                        if chunk.usage_metadata.is_some() {
                            latest = chunk.usage_metadata;
                        }
                    }
                    Err(e) => {
                        warn!("Gemini stream aborted: {}", e);
                        yield StreamFrame::Error(e.to_string());
                        return;
                    }
                }
            }
            if let Some(usage) = latest {
                yield StreamFrame::Usage(UsageSummary {
                    input_tokens: usage.prompt_token_count,
                    output_tokens: usage.candidates_token_count,
                    model: model.clone(),
                    thread_id: None,
                });
            }
        }))
    }
}

/// Assemble the generate request for one turn.
///
/// With documents present the conversation opens with a synthetic user turn
/// referencing every document and a model acknowledgment; prior history
/// follows and the newest user message closes it.
pub fn build_request(documents: &[GeminiFile], history: &[ChatMessage]) -> Result<GenerateRequest> {
    let newest = last_user_index(history)
        .ok_or_else(|| Error::InvalidRequest("no user message to send".into()))?;

    let names: Vec<String> = documents.iter().map(|d| d.label().to_string()).collect();
    let mut contents = Vec::with_capacity(newest + 3);

    if !documents.is_empty() {
        let mut parts: Vec<Part> = documents
            .iter()
            .map(|d| Part::File {
                file_data: FileData {
                    mime_type: d.mime_type.clone(),
                    file_uri: d.uri.clone(),
                },
            })
            .collect();
        parts.push(Part::Text {
            text: GROUNDING_TURN.to_string(),
        });
        contents.push(Content {
            role: Some("user".into()),
            parts,
        });
        contents.push(Content::text(Some("model"), GROUNDING_ACK));
    }

    for message in history[..newest].iter().filter(|m| !m.content.is_empty()) {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        contents.push(Content::text(Some(role), message.content.clone()));
    }
    contents.push(Content::text(Some("user"), history[newest].content.clone()));

    Ok(GenerateRequest {
        system_instruction: Content::text(None, gemini_system_instruction(&names)),
        contents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::fake::FakeGemini;
    use crate::gemini::GenerateChunk;
    use crate::openai::fake::Scripted;

    fn doc(name: &str, state: &str) -> GeminiFile {
        GeminiFile {
            name: format!("files/{}", name),
            display_name: format!("{}.pdf", name),
            mime_type: "application/pdf".into(),
            uri: format!("https://example/files/{}", name),
            state: state.into(),
            create_time: "2024-05-01T10:00:00Z".into(),
        }
    }

    fn chunk(text: &str, prompt: u64, output: u64) -> Scripted<GenerateChunk> {
        let data = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}],
            "usageMetadata": {"promptTokenCount": prompt, "candidatesTokenCount": output},
        });
        Scripted::Item(serde_json::from_value(data).unwrap())
    }

    fn system_text(request: &GenerateRequest) -> &str {
        match &request.system_instruction.parts[0] {
            Part::Text { text } => text,
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn test_zero_documents_has_no_file_parts() {
        let request = build_request(&[], &[ChatMessage::user("What is X?")]).unwrap();
        assert!(system_text(&request).contains("none"));
        assert_eq!(request.contents.len(), 1);
        assert!(request
            .contents
            .iter()
            .flat_map(|c| &c.parts)
            .all(|p| matches!(p, Part::Text { .. })));
    }

    #[test]
    fn test_grounding_turn_precedes_history() {
        let history = vec![
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
        ];
        let request = build_request(&[doc("a", "ACTIVE"), doc("b", "ACTIVE")], &history).unwrap();

        assert!(system_text(&request).contains("a.pdf"));
        let roles: Vec<&str> = request
            .contents
            .iter()
            .map(|c| c.role.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(roles, vec!["user", "model", "user", "model", "user"]);
        let file_parts = request.contents[0]
            .parts
            .iter()
            .filter(|p| matches!(p, Part::File { .. }))
            .count();
        assert_eq!(file_parts, 2);
        assert_eq!(
            request.contents.last().unwrap().parts,
            vec![Part::Text { text: "q2".into() }]
        );
    }

    #[test]
    fn test_requires_user_message() {
        let err = build_request(&[], &[ChatMessage::assistant("hello")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_usage_keeps_latest_not_sum() {
        let fake = Arc::new(FakeGemini::new());
        fake.state.lock().files = vec![doc("a", "ACTIVE"), doc("b", "PROCESSING")];
        fake.state.lock().script = vec![chunk("The answer", 100, 2), chunk(" is 42.", 100, 5)];

        let adapter = GeminiAdapter::new(fake.clone(), "gemini-1.5-flash");
        let frames: Vec<StreamFrame> = adapter
            .open(vec![ChatMessage::user("What is the answer?")])
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            frames,
            vec![
                StreamFrame::TextDelta("The answer".into()),
                StreamFrame::TextDelta(" is 42.".into()),
                StreamFrame::Usage(UsageSummary {
                    input_tokens: 100,
                    output_tokens: 5,
                    model: "gemini-1.5-flash".into(),
                    thread_id: None,
                }),
            ]
        );

        let requests = fake.state.lock().requests.clone();
        let (_, request) = &requests[0];
        let file_parts = request.contents[0]
            .parts
            .iter()
            .filter(|p| matches!(p, Part::File { .. }))
            .count();
        assert_eq!(file_parts, 1);
    }

    #[tokio::test]
    async fn test_listing_failure_proceeds_ungrounded() {
        let fake = Arc::new(FakeGemini::new());
        fake.state.lock().fail_listing = true;
        fake.state.lock().script = vec![chunk("Not found in the documents.", 10, 6)];

        let adapter = GeminiAdapter::new(fake.clone(), "gemini-1.5-flash");
        let frames: Vec<StreamFrame> = adapter
            .open(vec![ChatMessage::user("What is X?")])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames.len(), 2);

        let requests = fake.state.lock().requests.clone();
        assert!(system_text(&requests[0].1).contains("none"));
    }

    #[tokio::test]
    async fn test_stream_error_after_text() {
        let fake = Arc::new(FakeGemini::new());
        fake.state.lock().script = vec![chunk("Part", 10, 1), Scripted::Fail("reset".into())];

        let adapter = GeminiAdapter::new(fake, "gemini-1.5-flash");
        let frames: Vec<StreamFrame> = adapter
            .open(vec![ChatMessage::user("hi")])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames[0], StreamFrame::TextDelta("Part".into()));
        assert!(matches!(frames[1], StreamFrame::Error(_)));
        assert_eq!(frames.len(), 2);
    }
}
