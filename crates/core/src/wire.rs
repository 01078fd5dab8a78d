use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// Error label carried by relay error payloads.
pub const UPSTREAM_ERROR_LABEL: &str = "Ollama error";

/// One role-tagged turn as it crosses the client/relay boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    /// Creates a wire turn.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
}

/// Non-streaming error payload returned when the upstream call fails.
///
/// `status` is the upstream HTTP status, or zero when the request never
/// produced a response at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayErrorBody {
    pub error: String,
    pub status: u16,
    pub detail: String,
}

impl RelayErrorBody {
    /// Builds the standard upstream-failure payload.
    pub fn upstream(status: u16, detail: impl Into<String>) -> Self {
        Self {
            error: UPSTREAM_ERROR_LABEL.to_string(),
            status,
            detail: detail.into(),
        }
    }
}
