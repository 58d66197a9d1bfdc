//! Fixed instructions sent to the vendors.

/// Name given to assistants created for document retrieval.
pub const ASSISTANT_NAME: &str = "Document Assistant";

pub const VECTOR_STORE_NAME: &str = "Document Store";

/// Instructions for OpenAI assistants that answer from their vector store.
pub const ASSISTANT_INSTRUCTIONS: &str = "You are a document assistant. \
Answer only from the files provided to you through file search. \
Cite the file each fact comes from as [Source: file name]. \
If the files do not contain the answer, say explicitly that the information \
could not be found in the provided documents.";

/// System prompt for plain chat completions (no assistant configured).
pub const COMPLETION_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
No documents are attached to this conversation; if the user asks about their \
documents, tell them to upload files first.";

/// Synthetic opening turn that hands the model its documents.
pub const GROUNDING_TURN: &str = "These are the documents you must answer from.";

/// Model acknowledgement of the grounding turn.
pub const GROUNDING_ACK: &str =
    "Understood. I will answer only from these documents and cite them as [Source: name].";

/// System instruction for Gemini with the active document names embedded.
pub fn gemini_system_instruction(document_names: &[String]) -> String {
    let documents = if document_names.is_empty() {
        "none".to_string()
    } else {
        document_names.join(", ")
    };
    format!(
        "You are a document assistant.\n\
         Available documents: {}\n\
         Rules:\n\
         - Answer only from the provided documents.\n\
         - Cite every fact as [Source: document name].\n\
         - If the documents do not contain the answer, state explicitly that the \
         information could not be found in the provided documents.",
        documents
    )
}
