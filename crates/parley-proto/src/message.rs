//! External message and conversation entities.
//!
//! The core never owns these lifecycles. A `Message` is persisted by the
//! message-store collaborator before the fan-out engine ever sees it
//! (persist-then-publish), and `read_by` is appended by the store, not here.
//! The core only relays the already-persisted objects to subscribers.

use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

/// A file attached to a message. Content lives in external object storage;
/// only the reference travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Download URL of the stored file.
    pub url: String,
    /// Original file name shown to users.
    pub name: String,
}

/// A persisted chat message, produced by the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identity. Clients deduplicate `new_message` deliveries
    /// by this id (the conversation-room and personal-room fan-outs are not
    /// deduplicated server-side).
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Author of the message.
    pub sender_id: UserId,
    /// The other participant; target of the personal-room notification.
    pub receiver_id: UserId,
    /// Message body.
    pub content: String,
    /// Attached files, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Creation time, Unix milliseconds UTC, assigned by the store.
    pub created_at: u64,
    /// Users who have read the message. Maintained by the store via
    /// read-receipt appends; relayed verbatim here.
    #[serde(default)]
    pub read_by: Vec<UserId>,
}

/// A direct-message conversation between exactly two participants.
///
/// Relay target only - persistence and participant management belong to the
/// conversation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Store-assigned identity.
    pub id: ConversationId,
    /// The two participants.
    pub participants: [UserId; 2],
    /// Most recent message, if any.
    pub last_message: Option<MessageId>,
    /// Last activity time, Unix milliseconds UTC.
    pub updated_at: u64,
}

impl Conversation {
    /// Whether `user` is one of the two participants.
    #[must_use]
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p == user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_participant_checks_both_slots() {
        let conv = Conversation {
            id: ConversationId::from("conv-1"),
            participants: [UserId::from("alice"), UserId::from("bob")],
            last_message: None,
            updated_at: 0,
        };
        assert!(conv.has_participant(&UserId::from("alice")));
        assert!(conv.has_participant(&UserId::from("bob")));
        assert!(!conv.has_participant(&UserId::from("mallory")));
    }

    #[test]
    fn message_json_omits_empty_attachments() {
        let msg = Message {
            id: MessageId::from("m1"),
            conversation_id: ConversationId::from("conv-1"),
            sender_id: UserId::from("alice"),
            receiver_id: UserId::from("bob"),
            content: "hi".to_string(),
            attachments: Vec::new(),
            created_at: 1_700_000_000_000,
            read_by: Vec::new(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("attachments"));

        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
