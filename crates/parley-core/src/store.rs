//! Collaborator store interfaces.
//!
//! The real-time core never persists anything itself: messages and
//! conversations live in external stores reached through these traits. The
//! traits are synchronous and take `&self` (implementations share state via
//! `Arc`), matching the pattern of handing one clone to the pipeline and
//! another to tests.
//!
//! In-memory implementations are provided for tests and local development;
//! production deployments back these with a database.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use parley_proto::{Attachment, Conversation, ConversationId, Message, MessageId, UserId};

/// Errors from collaborator store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced message does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// The referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// The backing store is unreachable or failed the write.
    ///
    /// By contract the fan-out engine is never invoked when this happens -
    /// persist-then-publish, never the reverse.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Message persistence collaborator.
///
/// The store owns message identity, `created_at`, and the `read_by` set; the
/// core only relays what the store returns.
pub trait MessageStore: Clone + Send + Sync + 'static {
    /// Persist a new message and return it with store-assigned fields.
    fn persist_message(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
        conversation_id: &ConversationId,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Message, StoreError>;

    /// Append `user_id` to the message's `read_by` set. Idempotent.
    fn append_read_receipt(
        &self,
        message_id: &MessageId,
        user_id: &UserId,
    ) -> Result<(), StoreError>;
}

/// Conversation persistence collaborator.
///
/// Touched on every publish so REST-fetched conversation lists stay
/// consistent with real-time state.
pub trait ConversationStore: Clone + Send + Sync + 'static {
    /// Update the conversation's `last_message` pointer and `updated_at`,
    /// creating the conversation entry if the store does not know it yet.
    fn touch_conversation(
        &self,
        conversation_id: &ConversationId,
        last_message: &Message,
    ) -> Result<(), StoreError>;
}

/// In-memory message store for tests and local development.
///
/// Timestamps are a monotonic logical counter, not wall-clock time, so test
/// assertions on ordering are deterministic.
///
/// # Panics
///
/// Panics if the internal mutex is poisoned (a thread panicked while holding
/// the lock). Acceptable for test/development code.
#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    inner: Arc<Mutex<MessageStoreInner>>,
}

#[derive(Default)]
struct MessageStoreInner {
    messages: HashMap<MessageId, Message>,
    next_seq: u64,
}

impl MemoryMessageStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a message by id. `None` if unknown.
    #[allow(clippy::expect_used)]
    pub fn get(&self, message_id: &MessageId) -> Option<Message> {
        self.inner.lock().expect("mutex poisoned").messages.get(message_id).cloned()
    }

    /// Number of persisted messages.
    #[allow(clippy::expect_used)]
    pub fn message_count(&self) -> usize {
        self.inner.lock().expect("mutex poisoned").messages.len()
    }
}

impl MessageStore for MemoryMessageStore {
    #[allow(clippy::expect_used)]
    fn persist_message(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
        conversation_id: &ConversationId,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        inner.next_seq += 1;
        let seq = inner.next_seq;

        let message = Message {
            id: MessageId::new(format!("m-{seq}")),
            conversation_id: conversation_id.clone(),
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
            content: content.to_string(),
            attachments,
            created_at: seq,
            read_by: Vec::new(),
        };

        inner.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    #[allow(clippy::expect_used)]
    fn append_read_receipt(
        &self,
        message_id: &MessageId,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        let message = inner
            .messages
            .get_mut(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.clone()))?;

        if !message.read_by.contains(user_id) {
            message.read_by.push(user_id.clone());
        }
        Ok(())
    }
}

/// In-memory conversation store for tests and local development.
///
/// # Panics
///
/// Panics if the internal mutex is poisoned. Acceptable for test/development
/// code.
#[derive(Clone, Default)]
pub struct MemoryConversationStore {
    inner: Arc<Mutex<HashMap<ConversationId, Conversation>>>,
}

impl MemoryConversationStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a conversation by id. `None` if unknown.
    #[allow(clippy::expect_used)]
    pub fn get(&self, conversation_id: &ConversationId) -> Option<Conversation> {
        self.inner.lock().expect("mutex poisoned").get(conversation_id).cloned()
    }
}

impl ConversationStore for MemoryConversationStore {
    #[allow(clippy::expect_used)]
    fn touch_conversation(
        &self,
        conversation_id: &ConversationId,
        last_message: &Message,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        let conversation = inner.entry(conversation_id.clone()).or_insert_with(|| Conversation {
            id: conversation_id.clone(),
            participants: [last_message.sender_id.clone(), last_message.receiver_id.clone()],
            last_message: None,
            updated_at: 0,
        });

        conversation.last_message = Some(last_message.id.clone());
        conversation.updated_at = last_message.created_at;
        Ok(())
    }
}
