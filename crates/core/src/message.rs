use serde::{Deserialize, Serialize};

use crate::stream::StreamSessionId;

/// Stable identifier for one message within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role, serialized lowercase on the wire and in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Lifecycle status for one message.
///
/// Status is ephemeral session state: it is never persisted, and reloaded
/// messages always land as `Done`. The `Streaming` variant carries the owning
/// session id so fragment appends target the placeholder by tag rather than
/// by list position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageStatus {
    Streaming(StreamSessionId),
    #[default]
    Done,
    Error(String),
    Cancelled,
}

/// One role-tagged message.
///
/// Content is append-only while the message carries `Streaming` status and
/// immutable once settled, except for the terminal notice replacement on
/// cancellation or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(skip, default)]
    pub status: MessageStatus,
}

impl Message {
    /// Creates a message with explicit status.
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            status,
        }
    }

    /// Creates a settled system message.
    pub fn system(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::System, content, MessageStatus::Done)
    }

    /// Creates a settled user message.
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, MessageStatus::Done)
    }

    /// Creates the empty assistant placeholder owned by one stream session.
    pub fn assistant_streaming(id: MessageId, session_id: StreamSessionId) -> Self {
        Self::new(
            id,
            Role::Assistant,
            String::new(),
            MessageStatus::Streaming(session_id),
        )
    }

    /// Returns true when this message is the placeholder owned by `session_id`.
    pub fn is_streaming_for(&self, session_id: StreamSessionId) -> bool {
        matches!(self.status, MessageStatus::Streaming(owner) if owner == session_id)
    }
}
