use snafu::ResultExt;

use murmur_core::{
    ChatRequest, ChatTurn, Conversation, ConversationId, Message, MessageStatus,
    StreamSessionId, StreamTarget, StreamTransition, title_from_first_user_message,
};
use murmur_storage::ConversationStore;

use crate::error::{
    AlreadyStreamingSnafu, ClientResult, EmptyMessageSnafu, LoadStoreSnafu,
    UnknownConversationSnafu,
};

/// Shown in place of a partial response the user stopped.
pub const CANCELLED_NOTICE: &str = "Response stopped.";

/// System prompt used when the embedder does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Everything a transport needs to carry one prepared send to the wire.
#[derive(Debug, Clone)]
pub struct PreparedSend {
    pub target: StreamTarget,
    pub request: ChatRequest,
}

/// The conversation collection plus its tracked active conversation.
///
/// Every mutation persists both store keys synchronously; a persistence
/// failure is logged and does not fail the operation that caused it.
#[derive(Debug)]
pub struct ChatWorkspace {
    conversations: Vec<Conversation>,
    active_id: Option<ConversationId>,
    store: ConversationStore,
    next_session_id: u64,
    system_prompt: String,
}

impl ChatWorkspace {
    /// Loads persisted state and guarantees an active conversation exists.
    pub fn load(store: ConversationStore, system_prompt: impl Into<String>) -> ClientResult<Self> {
        let stored = store.load().context(LoadStoreSnafu { stage: "load-store" })?;

        let mut workspace = Self {
            conversations: stored.conversations,
            active_id: stored.active_id,
            store,
            next_session_id: 1,
            system_prompt: system_prompt.into(),
        };
        workspace.ensure_active();
        Ok(workspace)
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active_id
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.and_then(|id| self.find(id))
    }

    pub fn find(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == id)
    }

    fn find_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|conversation| conversation.id == id)
    }

    /// Re-establishes an active conversation when none is set or the tracked
    /// id no longer refers to a member. Creates one when the collection is
    /// empty.
    pub fn ensure_active(&mut self) -> ConversationId {
        if let Some(id) = self.active_id {
            if self.find(id).is_some() {
                return id;
            }
            tracing::warn!(conversation_id = %id, "active conversation id dangles, reassigning");
        }

        if let Some(first) = self.conversations.first() {
            let id = first.id;
            self.active_id = Some(id);
            self.persist();
            return id;
        }

        self.new_conversation()
    }

    /// Creates a conversation, makes it active, and persists. New
    /// conversations go to the front of the collection.
    pub fn new_conversation(&mut self) -> ConversationId {
        let conversation =
            Conversation::with_system_prompt(ConversationId::generate(), &self.system_prompt);
        let id = conversation.id;

        self.conversations.insert(0, conversation);
        self.active_id = Some(id);
        self.persist();
        id
    }

    /// Makes an existing conversation active.
    pub fn select(&mut self, id: ConversationId) -> ClientResult<()> {
        if self.find(id).is_none() {
            return UnknownConversationSnafu {
                stage: "select",
                conversation_id: id,
            }
            .fail();
        }

        self.active_id = Some(id);
        self.persist();
        Ok(())
    }

    /// Removes a conversation. When it was active, activity falls back to the
    /// first remaining conversation or a freshly created one.
    pub fn delete_conversation(&mut self, id: ConversationId) -> ClientResult<()> {
        if self.find(id).is_none() {
            return UnknownConversationSnafu {
                stage: "delete-conversation",
                conversation_id: id,
            }
            .fail();
        }

        self.conversations.retain(|conversation| conversation.id != id);
        if self.active_id == Some(id) {
            self.active_id = None;
        }
        self.persist();
        self.ensure_active();
        Ok(())
    }

    /// Starts a send against the active conversation.
    ///
    /// Trims the input and rejects empty text without effect. A conversation
    /// with a stream already in flight rejects the send. On success the user
    /// message and a session-tagged assistant placeholder are appended, the
    /// title is derived on the first user message, and the returned payload
    /// carries the history excluding the placeholder.
    pub fn begin_send(&mut self, text: &str) -> ClientResult<PreparedSend> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return EmptyMessageSnafu { stage: "begin-send" }.fail();
        }

        let conversation_id = self.ensure_active();
        let session_id = StreamSessionId::new(self.next_session_id);
        self.next_session_id += 1;
        let target = StreamTarget::new(conversation_id, session_id);

        let Some(conversation) = self.find_mut(conversation_id) else {
            return UnknownConversationSnafu {
                stage: "begin-send",
                conversation_id,
            }
            .fail();
        };

        if conversation
            .apply_stream_transition(StreamTransition::Start(target))
            .is_err()
        {
            return AlreadyStreamingSnafu {
                stage: "begin-send",
                conversation_id,
            }
            .fail();
        }

        let user_id = conversation.next_message_id();
        conversation.messages.push(Message::user(user_id, trimmed));

        // Always reread the first user message: a conversation whose first
        // message happens to read like the default title must not be
        // retitled by later sends.
        if conversation.has_default_title() {
            let derived = conversation
                .first_user_message()
                .map(title_from_first_user_message);
            if let Some(title) = derived {
                conversation.title = title;
            }
        }

        let request = ChatRequest {
            messages: conversation
                .messages
                .iter()
                .map(ChatTurn::from)
                .collect(),
        };

        let placeholder_id = conversation.next_message_id();
        conversation
            .messages
            .push(Message::assistant_streaming(placeholder_id, session_id));

        self.persist();
        Ok(PreparedSend { target, request })
    }

    /// Appends one token fragment to the placeholder owned by `target`.
    ///
    /// Fragments for a session that is no longer active are dropped.
    pub fn apply_delta(&mut self, target: StreamTarget, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        let Some(conversation) = self.find_mut(target.conversation_id) else {
            return;
        };
        if !conversation.stream_state.accepts_stream_event(target) {
            tracing::debug!(
                conversation_id = %target.conversation_id,
                session_id = target.session_id.0,
                "dropping fragment for inactive stream session"
            );
            return;
        }

        if let Some(placeholder) = conversation.streaming_message_mut(target.session_id) {
            placeholder.content.push_str(fragment);
        }
        self.persist();
    }

    /// Settles the placeholder: the streamed content stands as-is.
    pub fn complete(&mut self, target: StreamTarget) {
        self.finish(target, StreamTransition::Complete(target), None);
    }

    /// Replaces the placeholder content with the failure notice.
    pub fn fail(&mut self, target: StreamTarget, detail: &str) {
        self.finish(
            target,
            StreamTransition::Fail {
                target,
                message: detail.to_string(),
            },
            Some((format!("⚠️ Error: {detail}"), MessageStatus::Error(detail.to_string()))),
        );
    }

    /// Replaces the placeholder content with the cancellation notice,
    /// discarding any partial response.
    pub fn cancel(&mut self, target: StreamTarget) {
        self.finish(
            target,
            StreamTransition::Cancel(target),
            Some((CANCELLED_NOTICE.to_string(), MessageStatus::Cancelled)),
        );
    }

    fn finish(
        &mut self,
        target: StreamTarget,
        transition: StreamTransition,
        replacement: Option<(String, MessageStatus)>,
    ) {
        let Some(conversation) = self.find_mut(target.conversation_id) else {
            return;
        };

        if let Some(placeholder) = conversation.streaming_message_mut(target.session_id) {
            match replacement {
                Some((content, status)) => {
                    placeholder.content = content;
                    placeholder.status = status;
                }
                None => placeholder.status = MessageStatus::Done,
            }
        }

        if let Err(rejection) = conversation.apply_stream_transition(transition) {
            tracing::warn!(
                conversation_id = %target.conversation_id,
                session_id = target.session_id.0,
                ?rejection,
                "stream transition rejected"
            );
        }
        self.persist();
    }

    /// Writes both store keys; failures are logged, never propagated.
    fn persist(&self) {
        if let Err(error) = self.store.save_conversations(&self.conversations) {
            tracing::warn!(%error, "failed to persist conversation collection");
        }
        if let Err(error) = self.store.save_active_id(self.active_id) {
            tracing::warn!(%error, "failed to persist active conversation id");
        }
    }
}
