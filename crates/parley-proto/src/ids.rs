//! Typed identifiers and room keys.
//!
//! Identifiers are string newtypes: the external stores (database, payment
//! provider) own id generation, the core only relays them. `ConnectionId` is
//! the exception - it identifies one live transport session and is assigned
//! by the server runtime, never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw identifier string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (invalid on the wire).
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id! {
    /// Logical user identity, supplied by the authentication collaborator.
    UserId
}

string_id! {
    /// One chat thread between two participants.
    ConversationId
}

string_id! {
    /// Identity of a persisted message, owned by the message store.
    MessageId
}

string_id! {
    /// Identity of an order, owned by the order collaborator.
    OrderId
}

/// One live transport session between a client device/tab and the server.
///
/// Assigned randomly by the runtime on accept. A user may own many of these
/// concurrently (multi-tab/multi-device); each is tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw connection id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A named logical channel that connections subscribe to.
///
/// Two kinds exist: the personal room every authenticated connection is
/// auto-joined to for account-wide notifications, and conversation rooms
/// joined only while a chat thread is actively viewed. Conversation rooms are
/// keyed by conversation identity rather than participant pair, so group
/// conversations need no schema change, only a join-time policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// Personal/notification room, `user:<userId>` on the wire.
    User(UserId),
    /// Chat room, `conversation:<conversationId>` on the wire.
    Conversation(ConversationId),
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Conversation(id) => write!(f, "conversation:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_key_wire_form() {
        let personal = RoomKey::User(UserId::from("u-7"));
        assert_eq!(personal.to_string(), "user:u-7");

        let conv = RoomKey::Conversation(ConversationId::from("conv-42"));
        assert_eq!(conv.to_string(), "conversation:conv-42");
    }

    #[test]
    fn room_keys_with_same_id_in_different_namespaces_differ() {
        let a = RoomKey::User(UserId::from("x"));
        let b = RoomKey::Conversation(ConversationId::from("x"));
        assert_ne!(a, b);
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let id = ConversationId::from("conv-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conv-42\"");

        let back: ConversationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
