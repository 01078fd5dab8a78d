use snafu::Snafu;

use murmur_core::ConversationId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("failed to load the conversation store"))]
    LoadStore {
        stage: &'static str,
        source: murmur_storage::StorageError,
    },
    #[snafu(display("message is empty after trimming"))]
    EmptyMessage { stage: &'static str },
    #[snafu(display("no conversation {conversation_id}"))]
    UnknownConversation {
        stage: &'static str,
        conversation_id: ConversationId,
    },
    #[snafu(display("conversation {conversation_id} already has a stream in flight"))]
    AlreadyStreaming {
        stage: &'static str,
        conversation_id: ConversationId,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;
