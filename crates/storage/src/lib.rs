pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{CONVERSATIONS_KEY, ACTIVE_CONVERSATION_KEY, ConversationStore, StoredState};
