//! Client state machine.
//!
//! Mirrors the server driver's shape on the client side: the caller feeds
//! [`ClientCommand`]s (transport lifecycle, UI intents, ticks) and executes
//! the returned [`ClientAction`]s. The machine owns everything stateful the
//! UI should not re-implement per screen:
//!
//! - which conversations are open, so a reconnect can resubscribe them all
//! - the local typing burst per conversation, so `typing_start` goes out
//!   once per burst and `typing_stop` follows 1000ms of composer silence
//! - a window of seen message ids, so the duplicate `new_message` copy
//!   (conversation room + personal room) is dropped before dispatch

use std::{
    collections::{HashMap, HashSet, VecDeque},
    ops::Sub,
    time::Duration,
};

use parley_proto::{ClientEvent, ConversationId, MessageId, ServerEvent, UserId};

use crate::{
    dispatch::{Dispatcher, EventKind, SubscriptionId},
    event::{ClientAction, ClientCommand},
};

/// Composer silence after which `typing_stop` is sent.
pub const TYPING_IDLE: Duration = Duration::from_millis(1000);

/// How many recent message ids are remembered for deduplication.
const SEEN_MESSAGE_CAP: usize = 1024;

/// Client for the Parley real-time protocol.
///
/// Generic over `I` (Instant type); production uses `std::time::Instant`.
#[derive(Debug)]
pub struct Client<I = std::time::Instant> {
    /// Authenticated identity.
    user_id: UserId,
    /// Display name, relayed in typing events.
    username: String,
    /// Whether the transport is currently up.
    connected: bool,
    /// Conversations with an open view.
    open_conversations: HashSet<ConversationId>,
    /// Conversation → last keystroke time for active local bursts.
    typing: HashMap<ConversationId, I>,
    /// Composer-idle window.
    typing_idle: Duration,
    /// Subscription table for inbound events.
    dispatcher: Dispatcher,
    /// Recently seen message ids (set + eviction order).
    seen_messages: HashSet<MessageId>,
    seen_order: VecDeque<MessageId>,
}

impl<I> Client<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a client for the given identity.
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            connected: false,
            open_conversations: HashSet::new(),
            typing: HashMap::new(),
            typing_idle: TYPING_IDLE,
            dispatcher: Dispatcher::new(),
            seen_messages: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    /// Override the composer-idle window.
    #[must_use]
    pub fn with_typing_idle(mut self, typing_idle: Duration) -> Self {
        self.typing_idle = typing_idle;
        self
    }

    /// The client's identity.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Whether the transport is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether a conversation view is open.
    #[must_use]
    pub fn is_viewing(&self, conversation_id: &ConversationId) -> bool {
        self.open_conversations.contains(conversation_id)
    }

    /// Register interest in an event kind.
    pub fn subscribe(&mut self, kind: EventKind) -> SubscriptionId {
        self.dispatcher.subscribe(kind)
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Process a command and return the actions to execute.
    pub fn handle(&mut self, command: ClientCommand<I>) -> Vec<ClientAction> {
        match command {
            ClientCommand::Connected => self.handle_connected(),
            ClientCommand::Disconnected => self.handle_disconnected(),
            ClientCommand::EventReceived(event) => self.handle_event_received(event),
            ClientCommand::OpenConversation { conversation_id } => {
                self.handle_open_conversation(conversation_id)
            },
            ClientCommand::CloseConversation { conversation_id } => {
                self.handle_close_conversation(&conversation_id)
            },
            ClientCommand::Keystroke { conversation_id, now } => {
                self.handle_keystroke(conversation_id, now)
            },
            ClientCommand::MessageSent { conversation_id } => {
                self.handle_message_sent(&conversation_id)
            },
            ClientCommand::Tick { now } => self.handle_tick(now),
        }
    }

    /// Authenticate and resubscribe everything that was open.
    ///
    /// Open conversations survive a disconnect precisely so this replay
    /// works: after a reconnect the server's membership matches the UI again
    /// without the screens doing anything.
    fn handle_connected(&mut self) -> Vec<ClientAction> {
        self.connected = true;
        self.typing.clear();

        let mut actions =
            vec![ClientAction::Send(ClientEvent::JoinUserRoom { user_id: self.user_id.clone() })];

        let mut open: Vec<&ConversationId> = self.open_conversations.iter().collect();
        open.sort();
        for conversation_id in open {
            actions.push(ClientAction::Send(ClientEvent::JoinConversation {
                conversation_id: conversation_id.clone(),
            }));
        }

        actions
    }

    fn handle_disconnected(&mut self) -> Vec<ClientAction> {
        self.connected = false;
        // Server-side bursts die with the connection; drop the local mirrors.
        self.typing.clear();
        Vec::new()
    }

    fn handle_open_conversation(&mut self, conversation_id: ConversationId) -> Vec<ClientAction> {
        if !self.open_conversations.insert(conversation_id.clone()) {
            return Vec::new();
        }

        if self.connected {
            vec![ClientAction::Send(ClientEvent::JoinConversation { conversation_id })]
        } else {
            // Queued: the join goes out with the next Connected replay.
            Vec::new()
        }
    }

    fn handle_close_conversation(&mut self, conversation_id: &ConversationId) -> Vec<ClientAction> {
        if !self.open_conversations.remove(conversation_id) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.typing.remove(conversation_id).is_some() && self.connected {
            actions.push(ClientAction::Send(ClientEvent::TypingStop {
                conversation_id: conversation_id.clone(),
                user_id: self.user_id.clone(),
            }));
        }
        if self.connected {
            actions.push(ClientAction::Send(ClientEvent::LeaveConversation {
                conversation_id: conversation_id.clone(),
            }));
        }
        actions
    }

    /// Debounced typing signal: `typing_start` once per burst.
    fn handle_keystroke(&mut self, conversation_id: ConversationId, now: I) -> Vec<ClientAction> {
        if !self.connected {
            return Vec::new();
        }

        let starting = !self.typing.contains_key(&conversation_id);
        self.typing.insert(conversation_id.clone(), now);

        if !starting {
            return Vec::new();
        }

        vec![ClientAction::Send(ClientEvent::TypingStart {
            conversation_id,
            user_id: self.user_id.clone(),
            username: self.username.clone(),
        })]
    }

    fn handle_message_sent(&mut self, conversation_id: &ConversationId) -> Vec<ClientAction> {
        if self.typing.remove(conversation_id).is_none() || !self.connected {
            return Vec::new();
        }

        vec![ClientAction::Send(ClientEvent::TypingStop {
            conversation_id: conversation_id.clone(),
            user_id: self.user_id.clone(),
        })]
    }

    /// End bursts whose composer has been silent past the idle window.
    fn handle_tick(&mut self, now: I) -> Vec<ClientAction> {
        let idle = self.typing_idle;
        let mut expired: Vec<ConversationId> = self
            .typing
            .iter()
            .filter(|&(_, &last)| now >= last && now - last >= idle)
            .map(|(conversation_id, _)| conversation_id.clone())
            .collect();
        expired.sort();

        let mut actions = Vec::new();
        for conversation_id in expired {
            self.typing.remove(&conversation_id);
            if self.connected {
                actions.push(ClientAction::Send(ClientEvent::TypingStop {
                    conversation_id,
                    user_id: self.user_id.clone(),
                }));
            }
        }
        actions
    }

    /// Deduplicate and dispatch an inbound event.
    fn handle_event_received(&mut self, event: ServerEvent) -> Vec<ClientAction> {
        if let ServerEvent::NewMessage(message) = &event {
            if !self.remember_message(message.id.clone()) {
                return Vec::new();
            }
        }

        self.dispatcher
            .matching(&event)
            .into_iter()
            .map(|subscription| ClientAction::Notify { subscription, event: event.clone() })
            .collect()
    }

    /// Record a message id. Returns `false` if it was already seen.
    fn remember_message(&mut self, id: MessageId) -> bool {
        if !self.seen_messages.insert(id.clone()) {
            return false;
        }

        self.seen_order.push_back(id);
        if self.seen_order.len() > SEEN_MESSAGE_CAP
            && let Some(evicted) = self.seen_order.pop_front()
        {
            self.seen_messages.remove(&evicted);
        }
        true
    }
}
