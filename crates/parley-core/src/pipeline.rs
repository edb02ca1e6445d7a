//! Message-creation pipeline: persist, touch, then publish.
//!
//! The fan-out engine assumes every message it sees already survived
//! persistence - "persist-then-publish", never the reverse, so a reload never
//! loses a message a client saw in real time. This type is the caller-side
//! glue that makes the contract unforgeable: the publish sink is only reached
//! after both store writes succeed.

use parley_proto::{Attachment, ConversationId, Message, MessageId, UserId};

use crate::store::{ConversationStore, MessageStore, StoreError};

/// Sink through which already-persisted events enter the fan-out engine.
///
/// Fire-and-forget: delivery is best-effort per connection and the pipeline
/// does not await confirmation.
pub trait Publish {
    /// Fan a newly persisted message out to its conversation room and the
    /// receiver's personal room.
    fn publish_message(&self, message: Message);

    /// Broadcast a read receipt to the conversation room. The store has
    /// already appended the reader to `read_by`.
    fn publish_read_receipt(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        user_id: UserId,
    );
}

/// Errors from the message-creation pipeline.
///
/// A store failure here means the message was never published; the caller
/// surfaces the error at the REST layer and the real-time core stays silent.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A collaborator store rejected the write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Composes the collaborator stores with a publish sink.
///
/// One pipeline instance per process; clones of the stores and sink share
/// state internally.
#[derive(Clone)]
pub struct MessagePipeline<M, C, P> {
    messages: M,
    conversations: C,
    publisher: P,
}

impl<M, C, P> MessagePipeline<M, C, P>
where
    M: MessageStore,
    C: ConversationStore,
    P: Publish,
{
    /// Create a pipeline over the given stores and publish sink.
    pub fn new(messages: M, conversations: C, publisher: P) -> Self {
        Self { messages, conversations, publisher }
    }

    /// Persist a new message, update its conversation, and publish it.
    ///
    /// Publishing only happens after both store writes succeed. On error the
    /// fan-out engine is never invoked and no client sees a phantom message.
    pub fn send_message(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
        conversation_id: &ConversationId,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Message, PipelineError> {
        let message = self.messages.persist_message(
            sender_id,
            receiver_id,
            conversation_id,
            content,
            attachments,
        )?;
        self.conversations.touch_conversation(conversation_id, &message)?;

        self.publisher.publish_message(message.clone());
        Ok(message)
    }

    /// Record that `user_id` read `message_id` and broadcast the receipt.
    ///
    /// Read state is explicit - publishing a message never marks it read.
    pub fn mark_message_read(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        user_id: &UserId,
    ) -> Result<(), PipelineError> {
        self.messages.append_read_receipt(message_id, user_id)?;

        self.publisher.publish_read_receipt(
            conversation_id.clone(),
            message_id.clone(),
            user_id.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::store::{MemoryConversationStore, MemoryMessageStore};

    /// Publish sink that records everything it receives.
    #[derive(Clone, Default)]
    struct RecordingSink {
        published: Arc<Mutex<Vec<Message>>>,
        receipts: Arc<Mutex<Vec<(ConversationId, MessageId, UserId)>>>,
    }

    impl Publish for RecordingSink {
        fn publish_message(&self, message: Message) {
            self.published.lock().unwrap().push(message);
        }

        fn publish_read_receipt(
            &self,
            conversation_id: ConversationId,
            message_id: MessageId,
            user_id: UserId,
        ) {
            self.receipts.lock().unwrap().push((conversation_id, message_id, user_id));
        }
    }

    /// Message store that refuses every write.
    #[derive(Clone)]
    struct UnavailableStore;

    impl MessageStore for UnavailableStore {
        fn persist_message(
            &self,
            _sender_id: &UserId,
            _receiver_id: &UserId,
            _conversation_id: &ConversationId,
            _content: &str,
            _attachments: Vec<Attachment>,
        ) -> Result<Message, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn append_read_receipt(
            &self,
            message_id: &MessageId,
            _user_id: &UserId,
        ) -> Result<(), StoreError> {
            Err(StoreError::MessageNotFound(message_id.clone()))
        }
    }

    #[test]
    fn send_message_persists_touches_then_publishes() {
        let messages = MemoryMessageStore::new();
        let conversations = MemoryConversationStore::new();
        let sink = RecordingSink::default();
        let pipeline = MessagePipeline::new(messages.clone(), conversations.clone(), sink.clone());

        let conv = ConversationId::from("conv-1");
        let msg = pipeline
            .send_message(&UserId::from("alice"), &UserId::from("bob"), &conv, "hi", Vec::new())
            .unwrap();

        assert!(messages.get(&msg.id).is_some());
        assert_eq!(conversations.get(&conv).unwrap().last_message, Some(msg.id.clone()));

        let published = sink.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, msg.id);
    }

    #[test]
    fn persistence_failure_never_publishes() {
        let conversations = MemoryConversationStore::new();
        let sink = RecordingSink::default();
        let pipeline = MessagePipeline::new(UnavailableStore, conversations, sink.clone());

        let result = pipeline.send_message(
            &UserId::from("alice"),
            &UserId::from("bob"),
            &ConversationId::from("conv-1"),
            "hi",
            Vec::new(),
        );

        assert!(matches!(result, Err(PipelineError::Store(StoreError::Unavailable(_)))));
        assert!(sink.published.lock().unwrap().is_empty());
    }

    #[test]
    fn mark_read_appends_then_broadcasts() {
        let messages = MemoryMessageStore::new();
        let conversations = MemoryConversationStore::new();
        let sink = RecordingSink::default();
        let pipeline = MessagePipeline::new(messages.clone(), conversations, sink.clone());

        let conv = ConversationId::from("conv-1");
        let msg = pipeline
            .send_message(&UserId::from("alice"), &UserId::from("bob"), &conv, "hi", Vec::new())
            .unwrap();

        pipeline.mark_message_read(&conv, &msg.id, &UserId::from("bob")).unwrap();

        assert_eq!(messages.get(&msg.id).unwrap().read_by, vec![UserId::from("bob")]);
        let receipts = sink.receipts.lock().unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].1, msg.id);
    }

    #[test]
    fn read_receipt_failure_never_broadcasts() {
        let sink = RecordingSink::default();
        let pipeline = MessagePipeline::new(UnavailableStore, MemoryConversationStore::new(), sink.clone());

        let result = pipeline.mark_message_read(
            &ConversationId::from("conv-1"),
            &MessageId::from("m-404"),
            &UserId::from("bob"),
        );

        assert!(result.is_err());
        assert!(sink.receipts.lock().unwrap().is_empty());
    }
}
