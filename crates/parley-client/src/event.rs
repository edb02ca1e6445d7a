//! Client commands and actions.

use parley_proto::{ClientEvent, ConversationId, ServerEvent};

use crate::dispatch::SubscriptionId;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Driving the transport (connect, read frames, write frames)
/// - Driving time forward via ticks
/// - Forwarding UI intents (open a conversation, keystrokes, etc.)
///
/// Generic over `I` (Instant type) so production uses `std::time::Instant`
/// and tests use any hand-advanced instant.
#[derive(Debug, Clone)]
pub enum ClientCommand<I = std::time::Instant> {
    /// The transport connected (or reconnected).
    Connected,

    /// The transport dropped.
    Disconnected,

    /// A decoded server event arrived.
    EventReceived(ServerEvent),

    /// The user opened a conversation view.
    OpenConversation {
        /// Conversation being viewed.
        conversation_id: ConversationId,
    },

    /// The user closed a conversation view.
    CloseConversation {
        /// Conversation no longer viewed.
        conversation_id: ConversationId,
    },

    /// The user pressed a key in a conversation's composer.
    Keystroke {
        /// Conversation being typed in.
        conversation_id: ConversationId,
        /// Current time.
        now: I,
    },

    /// The user sent their message (composer cleared).
    MessageSent {
        /// Conversation the message went to.
        conversation_id: ConversationId,
    },

    /// Time tick for local typing-idle detection.
    Tick {
        /// Current time.
        now: I,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Send an event to the server.
    ///
    /// The caller encodes it (`ClientEvent::encode`) and writes the text
    /// frame.
    Send(ClientEvent),

    /// Deliver a server event to a subscriber.
    ///
    /// One action per matching subscription; duplicate `new_message` events
    /// have already been filtered out.
    Notify {
        /// Subscription that matched.
        subscription: SubscriptionId,
        /// The event.
        event: ServerEvent,
    },
}
