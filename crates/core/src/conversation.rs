use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, MessageId, Role};
use crate::stream::{StreamSessionId, StreamState, StreamTransition, StreamTransitionResult};

/// Title used for conversations that have not received a user message yet.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New chat";

/// Maximum number of characters kept when deriving a title from the first
/// user message; anything longer is cut there and marked with an ellipsis.
pub const TITLE_MAX_CHARS: usize = 32;

const TITLE_ELLIPSIS: char = '…';

/// Opaque unique identifier for one conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    /// Creates a typed conversation identifier.
    pub const fn new(raw: Uuid) -> Self {
        Self(raw)
    }

    /// Mints a fresh time-ordered identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Fixed identifier, for tests and fixtures.
    pub const fn from_u128(raw: u128) -> Self {
        Self(Uuid::from_u128(raw))
    }

    /// Parses an identifier from its string form.
    pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A titled, ordered sequence of role-tagged messages.
///
/// Every conversation opens with one system message. `stream_state` is
/// per-session runtime state and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub created_at_unix_ms: u64,
    pub messages: Vec<Message>,
    #[serde(skip, default)]
    pub stream_state: StreamState,
}

impl Conversation {
    /// Creates a conversation seeded with the given system prompt.
    pub fn with_system_prompt(id: ConversationId, system_prompt: impl Into<String>) -> Self {
        Self {
            id,
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            created_at_unix_ms: current_unix_timestamp_ms(),
            messages: vec![Message::system(MessageId::new(1), system_prompt)],
            stream_state: StreamState::default(),
        }
    }

    /// Returns the next free message id for this conversation.
    ///
    /// Ids are max-existing + 1 so they survive reloads without a counter.
    pub fn next_message_id(&self) -> MessageId {
        let highest = self
            .messages
            .iter()
            .map(|message| message.id.0)
            .max()
            .unwrap_or(0);
        MessageId::new(highest.saturating_add(1))
    }

    /// Returns true while the default placeholder title is still in place.
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_CONVERSATION_TITLE
    }

    /// Returns the content of the first user message, if any.
    pub fn first_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }

    /// Finds the assistant placeholder owned by `session_id`.
    ///
    /// Lookup is by session tag, never by list position, so fragments cannot
    /// leak into a different message if histories interleave.
    pub fn streaming_message_mut(&mut self, session_id: StreamSessionId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .find(|message| message.is_streaming_for(session_id))
    }

    /// Returns true while a stream session is active for this conversation.
    pub fn is_streaming(&self) -> bool {
        self.stream_state.active_target().is_some()
    }

    /// Applies a deterministic stream transition.
    pub fn apply_stream_transition(
        &mut self,
        transition: StreamTransition,
    ) -> StreamTransitionResult {
        let next_state = self.stream_state.apply(transition)?;
        self.stream_state = next_state.clone();
        Ok(next_state)
    }
}

/// Derives a conversation title from the first user message.
///
/// Exactly `TITLE_MAX_CHARS` characters are kept unmodified; longer input is
/// cut at that count and suffixed with an ellipsis. Counting is by `char`, not
/// by byte.
pub fn title_from_first_user_message(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }

    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    title.push(TITLE_ELLIPSIS);
    title
}

/// Current wall-clock time as unix milliseconds, saturating at zero.
pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as u64)
}
