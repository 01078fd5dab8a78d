pub mod conversation;
pub mod message;
pub mod stream;
pub mod wire;

pub use conversation::{
    Conversation, ConversationId, DEFAULT_CONVERSATION_TITLE, TITLE_MAX_CHARS,
    current_unix_timestamp_ms, title_from_first_user_message,
};
pub use message::{Message, MessageId, MessageStatus, Role};
pub use stream::{
    StreamEventMapped, StreamEventPayload, StreamSessionId, StreamState, StreamTarget,
    StreamTransition, StreamTransitionRejection, StreamTransitionResult,
};
pub use wire::{ChatRequest, ChatTurn, RelayErrorBody, UPSTREAM_ERROR_LABEL};
