//! Inbound and outbound event enumerations.
//!
//! `ClientEvent` covers everything a client may send; `ServerEvent` covers
//! everything the core may push. Both serialize adjacently tagged so one text
//! frame carries the event name and its payload. The dispatcher's only logic
//! is routing these variants and validating required fields - there is no
//! request/response acknowledgment layer.
//!
//! # Invariants
//!
//! - Closed set: unknown `event` tags fail deserialization and the frame is
//!   dropped. Adding a variant breaks every `match` until handled.
//! - Decode validation: `ClientEvent::decode` rejects payloads whose required
//!   identifiers are empty, so downstream code never sees a blank id.

use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    ids::{ConversationId, MessageId, OrderId, UserId},
    message::Message,
};

/// Events a client sends to the server.
///
/// Message creation is deliberately absent: messages enter the system through
/// the REST layer, which persists first and then publishes through the
/// application-facing driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a conversation room while viewing it.
    JoinConversation {
        /// Conversation to subscribe to.
        conversation_id: ConversationId,
    },

    /// Unsubscribe from a conversation room.
    LeaveConversation {
        /// Conversation to unsubscribe from.
        conversation_id: ConversationId,
    },

    /// The user started (or continues) typing in a conversation.
    TypingStart {
        /// Conversation being typed in.
        conversation_id: ConversationId,
        /// The typing user.
        user_id: UserId,
        /// Display name, relayed for client-side rendering.
        username: String,
    },

    /// The user stopped typing (sent the message or went idle client-side).
    TypingStop {
        /// Conversation the user was typing in.
        conversation_id: ConversationId,
        /// The user who stopped.
        user_id: UserId,
    },

    /// Bind this connection to a user identity and join the personal room.
    JoinUserRoom {
        /// Authenticated user identity for this connection.
        user_id: UserId,
    },
}

impl ClientEvent {
    /// Wire name of this event, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation { .. } => "join_conversation",
            Self::LeaveConversation { .. } => "leave_conversation",
            Self::TypingStart { .. } => "typing_start",
            Self::TypingStop { .. } => "typing_stop",
            Self::JoinUserRoom { .. } => "join_user_room",
        }
    }

    /// Decode an inbound text frame and validate required fields.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` for unparsable JSON or unknown event tags
    /// - `ProtocolError::EmptyField` when a required identifier is blank
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let event: Self = serde_json::from_str(text)?;
        event.validate()?;
        Ok(event)
    }

    /// Encode for sending over a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::JoinConversation { conversation_id }
            | Self::LeaveConversation { conversation_id } => {
                require(conversation_id.as_str(), "conversation_id")
            },
            Self::TypingStart { conversation_id, user_id, .. }
            | Self::TypingStop { conversation_id, user_id } => {
                require(conversation_id.as_str(), "conversation_id")?;
                require(user_id.as_str(), "user_id")
            },
            Self::JoinUserRoom { user_id } => require(user_id.as_str(), "user_id"),
        }
    }
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A newly persisted message. Delivered to the conversation room and,
    /// independently, to the receiver's personal room; clients deduplicate
    /// by message id.
    NewMessage(Message),

    /// Someone started typing in a conversation the client is viewing.
    /// Broadcast unconditionally; clients filter their own `user_id`.
    UserTyping {
        /// Conversation being typed in.
        conversation_id: ConversationId,
        /// The typing user.
        user_id: UserId,
    },

    /// A typing burst ended (explicit stop or server-side expiry).
    UserStopTyping {
        /// Conversation the burst was in.
        conversation_id: ConversationId,
        /// The user who stopped.
        user_id: UserId,
    },

    /// A message was read; the store has already appended to `read_by`.
    MessageRead {
        /// Conversation the message belongs to.
        conversation_id: ConversationId,
        /// The message that was read.
        message_id: MessageId,
        /// The reader.
        user_id: UserId,
    },

    /// An order changed status; pushed to the affected user's personal room.
    OrderStatusChanged {
        /// The order in question.
        order_id: OrderId,
        /// New status, e.g. `"in_progress"`, `"delivered"`.
        status: String,
        /// Human-readable description for toasts.
        message: String,
    },

    /// A general notification for the user's personal room (badge/toast).
    Notification {
        /// Notification category, e.g. `"order"`, `"review"`.
        #[serde(rename = "type")]
        kind: String,
        /// Short title.
        title: String,
        /// Body text.
        message: String,
    },
}

impl ServerEvent {
    /// Wire name of this event, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::UserTyping { .. } => "user_typing",
            Self::UserStopTyping { .. } => "user_stop_typing",
            Self::MessageRead { .. } => "message_read",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::Notification { .. } => "notification",
        }
    }

    /// Encode for sending over a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a pushed event (client side).
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

fn require(value: &str, field: &'static str) -> Result<(), ProtocolError> {
    if value.is_empty() { Err(ProtocolError::EmptyField(field)) } else { Ok(()) }
}
