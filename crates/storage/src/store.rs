use std::path::{Path, PathBuf};

use snafu::ResultExt;

use murmur_core::{Conversation, ConversationId};

use crate::error::{
    CreateStoreDirectorySnafu, ReadKeySnafu, SerializeConversationsSnafu, StorageResult,
    WriteKeySnafu,
};

/// Persisted key holding the serialized conversation collection.
pub const CONVERSATIONS_KEY: &str = "chats_v1.json";

/// Persisted key holding the active conversation id as a plain string.
pub const ACTIVE_CONVERSATION_KEY: &str = "active_chat_v1";

/// Everything the store knows after a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredState {
    pub conversations: Vec<Conversation>,
    pub active_id: Option<ConversationId>,
}

/// Durable key-value store for the conversation collection and active id.
///
/// Two keys live as files under one root directory. Writes are synchronous
/// and non-atomic; a crash mid-write can lose the last update, which is an
/// accepted trade-off at this scope. A key that fails to parse on load is
/// treated as absent.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    root: PathBuf,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(default_store_root())
    }
}

impl ConversationStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads both persisted keys.
    ///
    /// Missing keys and parse failures both yield the empty default; only a
    /// hard read error on an existing file is surfaced.
    pub fn load(&self) -> StorageResult<StoredState> {
        let conversations = self.load_conversations()?;
        let active_id = self.load_active_id()?;
        Ok(StoredState {
            conversations,
            active_id,
        })
    }

    /// Replaces the persisted conversation collection.
    pub fn save_conversations(&self, conversations: &[Conversation]) -> StorageResult<()> {
        let serialized = serde_json::to_string(conversations).context(
            SerializeConversationsSnafu {
                stage: "serialize-conversations",
            },
        )?;
        self.write_key(CONVERSATIONS_KEY, &serialized)
    }

    /// Replaces the persisted active conversation id.
    ///
    /// `None` is stored as an empty value, matching "no active conversation".
    pub fn save_active_id(&self, active_id: Option<ConversationId>) -> StorageResult<()> {
        let serialized = active_id.map_or_else(String::new, |id| id.to_string());
        self.write_key(ACTIVE_CONVERSATION_KEY, &serialized)
    }

    fn load_conversations(&self) -> StorageResult<Vec<Conversation>> {
        let Some(raw) = self.read_key(CONVERSATIONS_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(conversations) => Ok(conversations),
            Err(error) => {
                tracing::warn!(
                    key = CONVERSATIONS_KEY,
                    %error,
                    "conversation collection failed to parse, starting empty"
                );
                Ok(Vec::new())
            }
        }
    }

    fn load_active_id(&self) -> StorageResult<Option<ConversationId>> {
        let Some(raw) = self.read_key(ACTIVE_CONVERSATION_KEY)? else {
            return Ok(None);
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        match ConversationId::parse(trimmed) {
            Ok(id) => Ok(Some(id)),
            Err(error) => {
                tracing::warn!(
                    key = ACTIVE_CONVERSATION_KEY,
                    %error,
                    "active conversation id failed to parse, clearing it"
                );
                Ok(None)
            }
        }
    }

    fn read_key(&self, key: &'static str) -> StorageResult<Option<String>> {
        let path = self.root.join(key);
        if !path.exists() {
            return Ok(None);
        }

        std::fs::read_to_string(&path)
            .map(Some)
            .context(ReadKeySnafu {
                stage: "read-key",
                key,
                path: display_path(&path),
            })
    }

    fn write_key(&self, key: &'static str, value: &str) -> StorageResult<()> {
        std::fs::create_dir_all(&self.root).context(CreateStoreDirectorySnafu {
            stage: "create-store-directory",
            path: display_path(&self.root),
        })?;

        let path = self.root.join(key);
        std::fs::write(&path, value).context(WriteKeySnafu {
            stage: "write-key",
            key,
            path: display_path(&path),
        })
    }
}

/// Default store root: the platform data directory, or a dot-directory in the
/// working directory when none is available.
pub fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|data_dir| data_dir.join("murmur"))
        .unwrap_or_else(|| PathBuf::from(".murmur"))
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{Message, MessageId};

    fn scratch_store(label: &str) -> ConversationStore {
        let root = std::env::temp_dir()
            .join("murmur-storage-tests")
            .join(format!("{label}-{}", uuid::Uuid::now_v7()));
        ConversationStore::new(root)
    }

    fn sample_conversations() -> Vec<Conversation> {
        let mut first = Conversation::with_system_prompt(
            ConversationId::from_u128(10),
            "You are a helpful assistant.",
        );
        first.title = "Hello".to_string();
        first
            .messages
            .push(Message::user(MessageId::new(2), "Hello"));
        first.messages.push(Message::new(
            MessageId::new(3),
            murmur_core::Role::Assistant,
            "Hi there",
            murmur_core::MessageStatus::Done,
        ));

        let second =
            Conversation::with_system_prompt(ConversationId::from_u128(11), "Another prompt");

        vec![first, second]
    }

    #[test]
    fn round_trip_preserves_collection() {
        let store = scratch_store("round-trip");
        let conversations = sample_conversations();
        let active_id = Some(conversations[0].id);

        store.save_conversations(&conversations).unwrap();
        store.save_active_id(active_id).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.conversations, conversations);
        assert_eq!(loaded.active_id, active_id);
    }

    #[test]
    fn missing_store_loads_empty() {
        let store = scratch_store("missing");
        let loaded = store.load().unwrap();
        assert!(loaded.conversations.is_empty());
        assert_eq!(loaded.active_id, None);
    }

    #[test]
    fn corrupt_collection_loads_empty() {
        let store = scratch_store("corrupt");
        store.save_conversations(&sample_conversations()).unwrap();

        std::fs::write(store.root().join(CONVERSATIONS_KEY), "{not json").unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.conversations.is_empty());
    }

    #[test]
    fn unparseable_active_id_is_cleared() {
        let store = scratch_store("bad-active");
        store.save_conversations(&sample_conversations()).unwrap();
        std::fs::write(store.root().join(ACTIVE_CONVERSATION_KEY), "not-a-uuid").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.active_id, None);
    }

    #[test]
    fn cleared_active_id_round_trips_as_none() {
        let store = scratch_store("clear-active");
        store.save_active_id(Some(ConversationId::from_u128(7))).unwrap();
        store.save_active_id(None).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.active_id, None);
    }
}
