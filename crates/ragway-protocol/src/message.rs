//! Chat history entries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message of a conversation. Treated as immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "new_id")]
    pub id: String,
    pub role: Role,
    pub content: String,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Index of the newest user message in a history, if any.
pub fn last_user_index(history: &[ChatMessage]) -> Option<usize> {
    history.iter().rposition(|m| m.role == Role::User)
}
