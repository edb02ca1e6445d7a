//! Typed event dispatch: subscriptions keyed by event kind.
//!
//! Subscribers register interest in one event kind and receive a
//! [`SubscriptionId`] to unsubscribe with later. Dispatch is a lookup, not a
//! scan: one map from kind to the live subscription set.

use std::collections::{HashMap, HashSet};

use parley_proto::ServerEvent;

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// The kinds of server events a subscriber can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `new_message` events.
    NewMessage,
    /// `user_typing` events.
    UserTyping,
    /// `user_stop_typing` events.
    UserStopTyping,
    /// `message_read` events.
    MessageRead,
    /// `order_status_changed` events.
    OrderStatusChanged,
    /// `notification` events.
    Notification,
}

impl EventKind {
    /// The kind of a concrete server event.
    #[must_use]
    pub const fn of(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::NewMessage(_) => Self::NewMessage,
            ServerEvent::UserTyping { .. } => Self::UserTyping,
            ServerEvent::UserStopTyping { .. } => Self::UserStopTyping,
            ServerEvent::MessageRead { .. } => Self::MessageRead,
            ServerEvent::OrderStatusChanged { .. } => Self::OrderStatusChanged,
            ServerEvent::Notification { .. } => Self::Notification,
        }
    }
}

/// Subscription table mapping event kinds to subscriber handles.
#[derive(Debug, Default)]
pub struct Dispatcher {
    subscriptions: HashMap<EventKind, HashSet<SubscriptionId>>,
    kind_of: HashMap<SubscriptionId, EventKind>,
    next_id: u64,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in an event kind.
    pub fn subscribe(&mut self, kind: EventKind) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        self.subscriptions.entry(kind).or_default().insert(id);
        self.kind_of.insert(id, kind);
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(kind) = self.kind_of.remove(&id) else {
            return false;
        };

        if let Some(set) = self.subscriptions.get_mut(&kind) {
            set.remove(&id);
            if set.is_empty() {
                self.subscriptions.remove(&kind);
            }
        }
        true
    }

    /// Subscriptions matching an event, in stable (insertion id) order.
    pub fn matching(&self, event: &ServerEvent) -> Vec<SubscriptionId> {
        let mut ids: Vec<SubscriptionId> = self
            .subscriptions
            .get(&EventKind::of(event))
            .into_iter()
            .flat_map(|set| set.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.kind_of.len()
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::{ConversationId, UserId};

    use super::*;

    fn typing_event() -> ServerEvent {
        ServerEvent::UserTyping {
            conversation_id: ConversationId::from("c1"),
            user_id: UserId::from("alice"),
        }
    }

    #[test]
    fn subscribers_only_match_their_kind() {
        let mut dispatcher = Dispatcher::new();

        let typing = dispatcher.subscribe(EventKind::UserTyping);
        let _messages = dispatcher.subscribe(EventKind::NewMessage);

        assert_eq!(dispatcher.matching(&typing_event()), vec![typing]);
    }

    #[test]
    fn multiple_subscribers_each_match() {
        let mut dispatcher = Dispatcher::new();

        let a = dispatcher.subscribe(EventKind::UserTyping);
        let b = dispatcher.subscribe(EventKind::UserTyping);

        assert_eq!(dispatcher.matching(&typing_event()), vec![a, b]);
    }

    #[test]
    fn unsubscribe_stops_matching() {
        let mut dispatcher = Dispatcher::new();

        let id = dispatcher.subscribe(EventKind::UserTyping);
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));

        assert!(dispatcher.matching(&typing_event()).is_empty());
        assert_eq!(dispatcher.subscription_count(), 0);
    }

    #[test]
    fn no_subscribers_means_no_matches() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.matching(&typing_event()).is_empty());
    }
}
