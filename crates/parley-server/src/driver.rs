//! Action-based server driver.
//!
//! Pure event-processing core of the real-time layer: the runtime feeds it
//! [`DriverEvent`]s (connection lifecycle, decoded client frames, ticks) and
//! executes the [`DriverAction`]s it returns. The driver itself performs no
//! I/O, which is what lets the whole event dispatch - room joins, typing
//! transitions, expiry - run under virtual time in tests.
//!
//! The application-facing half ([`ServerDriver::publish_message`] and
//! friends) turns already-persisted domain events into broadcast actions.
//! Those methods trust their input: persistence happened upstream in
//! `parley-core`'s pipeline before anything reaches the driver.

use std::time::Duration;

use parley_core::Environment;
use parley_proto::{
    ClientEvent, ConnectionId, ConversationId, Message, MessageId, OrderId, RoomKey, ServerEvent,
    UserId,
};

use crate::{
    driver_error::DriverError,
    registry::ConnectionRegistry,
    rooms::RoomMembership,
    typing::{TYPING_EXPIRY, TypingTracker},
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Typing-burst expiry window.
    pub typing_expiry: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: 10_000, typing_expiry: TYPING_EXPIRY }
    }
}

/// Events the driver processes.
///
/// Produced by the external runtime (production transport or tests).
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A new transport connection was accepted.
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime.
        connection_id: ConnectionId,
    },

    /// A decoded client event arrived on a connection.
    EventReceived {
        /// Connection that sent the event.
        connection_id: ConnectionId,
        /// The decoded event.
        event: ClientEvent,
    },

    /// A connection was closed (by peer or error).
    ConnectionClosed {
        /// Connection that was closed.
        connection_id: ConnectionId,
        /// Reason for closure.
        reason: String,
    },

    /// Periodic tick for typing expiry.
    Tick,
}

/// Actions the driver produces.
///
/// Executed by runtime-specific code; the driver never touches a socket.
#[derive(Debug, Clone)]
pub enum DriverAction {
    /// Broadcast an event to every connection in a room.
    ///
    /// The runtime resolves membership at execution time and delivers
    /// best-effort per connection.
    Broadcast {
        /// Target room.
        room: RoomKey,
        /// Event to broadcast.
        event: ServerEvent,
    },

    /// Close a connection.
    CloseConnection {
        /// Connection to close.
        connection_id: ConnectionId,
        /// Reason for closure.
        reason: String,
    },

    /// Log a message.
    Log {
        /// Log level.
        level: LogLevel,
        /// Message to log.
        message: String,
    },
}

/// Log levels for driver actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational message.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// Orchestrates the connection registry, room membership, and typing state.
pub struct ServerDriver<E>
where
    E: Environment,
{
    /// Live connections and their user bindings.
    registry: ConnectionRegistry,
    /// Room → connection membership.
    rooms: RoomMembership,
    /// Active typing bursts.
    typing: TypingTracker<E::Instant>,
    /// Environment (time, RNG).
    env: E,
    /// Server configuration.
    config: DriverConfig,
}

impl<E> ServerDriver<E>
where
    E: Environment,
{
    /// Create a new driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        let typing = TypingTracker::with_expiry(config.typing_expiry);
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomMembership::new(),
            typing,
            env,
            config,
        }
    }

    /// Process a runtime event and return the actions to execute.
    ///
    /// The main entry point for the driver.
    ///
    /// # Errors
    ///
    /// [`DriverError::ConnectionNotFound`] if the runtime delivers a client
    /// event for a connection that was never accepted.
    pub fn process_event(&mut self, event: DriverEvent) -> Result<Vec<DriverAction>, DriverError> {
        match event {
            DriverEvent::ConnectionAccepted { connection_id } => {
                Ok(self.handle_connection_accepted(connection_id))
            },
            DriverEvent::EventReceived { connection_id, event } => {
                self.handle_event_received(connection_id, event)
            },
            DriverEvent::ConnectionClosed { connection_id, reason } => {
                Ok(self.handle_connection_closed(connection_id, &reason))
            },
            DriverEvent::Tick => Ok(self.handle_tick()),
        }
    }

    fn handle_connection_accepted(&mut self, connection_id: ConnectionId) -> Vec<DriverAction> {
        if self.registry.connection_count() >= self.config.max_connections {
            return vec![DriverAction::CloseConnection {
                connection_id,
                reason: "max connections exceeded".to_string(),
            }];
        }

        if !self.registry.register(connection_id) {
            return vec![DriverAction::Log {
                level: LogLevel::Warn,
                message: format!("connection {connection_id} accepted twice"),
            }];
        }

        vec![DriverAction::Log {
            level: LogLevel::Debug,
            message: format!("connection {connection_id} accepted"),
        }]
    }

    fn handle_event_received(
        &mut self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<Vec<DriverAction>, DriverError> {
        if !self.registry.has_connection(connection_id) {
            return Err(DriverError::ConnectionNotFound(connection_id));
        }

        let actions = match event {
            ClientEvent::JoinUserRoom { user_id } => self.handle_join_user_room(connection_id, user_id),
            ClientEvent::JoinConversation { conversation_id } => {
                self.handle_join_conversation(connection_id, conversation_id)
            },
            ClientEvent::LeaveConversation { conversation_id } => {
                self.handle_leave_conversation(connection_id, &conversation_id)
            },
            ClientEvent::TypingStart { conversation_id, user_id, .. } => {
                self.handle_typing_start(connection_id, conversation_id, user_id)
            },
            ClientEvent::TypingStop { conversation_id, user_id } => {
                self.handle_typing_stop(connection_id, &conversation_id, &user_id)
            },
        };

        Ok(actions)
    }

    /// Bind the connection to its user identity and join the personal room.
    fn handle_join_user_room(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> Vec<DriverAction> {
        if !self.registry.bind_user(connection_id, &user_id) {
            return vec![DriverAction::Log {
                level: LogLevel::Warn,
                message: format!(
                    "connection {connection_id} tried to rebind to user {user_id}, dropping"
                ),
            }];
        }

        self.rooms.join(connection_id, RoomKey::User(user_id.clone()));

        vec![DriverAction::Log {
            level: LogLevel::Debug,
            message: format!("connection {connection_id} joined personal room for {user_id}"),
        }]
    }

    fn handle_join_conversation(
        &mut self,
        connection_id: ConnectionId,
        conversation_id: ConversationId,
    ) -> Vec<DriverAction> {
        let Some(user_id) = self.registry.user_of(connection_id) else {
            return vec![unauthenticated(connection_id, "join_conversation")];
        };
        let user_id = user_id.clone();

        self.rooms.join(connection_id, RoomKey::Conversation(conversation_id.clone()));

        vec![DriverAction::Log {
            level: LogLevel::Debug,
            message: format!(
                "connection {connection_id} (user {user_id}) joined conversation {conversation_id}"
            ),
        }]
    }

    fn handle_leave_conversation(
        &mut self,
        connection_id: ConnectionId,
        conversation_id: &ConversationId,
    ) -> Vec<DriverAction> {
        self.rooms.leave(connection_id, &RoomKey::Conversation(conversation_id.clone()));

        vec![DriverAction::Log {
            level: LogLevel::Debug,
            message: format!("connection {connection_id} left conversation {conversation_id}"),
        }]
    }

    /// Handle a typing signal: debounced broadcast on the idle→typing edge.
    fn handle_typing_start(
        &mut self,
        connection_id: ConnectionId,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Vec<DriverAction> {
        if !self.connection_speaks_for(connection_id, &user_id) {
            return vec![unauthenticated(connection_id, "typing_start")];
        }

        let now = self.env.now();
        if !self.typing.start(conversation_id.clone(), user_id.clone(), now) {
            // Renewal inside an active burst: timer reset, nothing to emit.
            return Vec::new();
        }

        vec![DriverAction::Broadcast {
            room: RoomKey::Conversation(conversation_id.clone()),
            event: ServerEvent::UserTyping { conversation_id, user_id },
        }]
    }

    fn handle_typing_stop(
        &mut self,
        connection_id: ConnectionId,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Vec<DriverAction> {
        if !self.connection_speaks_for(connection_id, user_id) {
            return vec![unauthenticated(connection_id, "typing_stop")];
        }

        if !self.typing.stop(conversation_id, user_id) {
            return Vec::new();
        }

        vec![stop_typing_broadcast(conversation_id.clone(), user_id.clone())]
    }

    /// Tear down everything the connection owned.
    ///
    /// Runs synchronously with the close event so no room retains a dead
    /// connection. If this was the user's last connection, their typing
    /// bursts end immediately rather than waiting for expiry.
    fn handle_connection_closed(
        &mut self,
        connection_id: ConnectionId,
        reason: &str,
    ) -> Vec<DriverAction> {
        let rooms_left = self.rooms.remove_connection(connection_id);

        let Some(info) = self.registry.deregister(connection_id) else {
            // Late or duplicate close signal.
            return Vec::new();
        };

        let mut actions = vec![DriverAction::Log {
            level: LogLevel::Info,
            message: format!(
                "connection {connection_id} closed: {reason}, was in {} rooms",
                rooms_left.len()
            ),
        }];

        if let Some(user_id) = info.user_id
            && !self.registry.user_is_connected(&user_id)
        {
            for conversation_id in self.typing.clear_user(&user_id) {
                actions.push(stop_typing_broadcast(conversation_id, user_id.clone()));
            }
        }

        actions
    }

    /// Expire stale typing bursts.
    fn handle_tick(&mut self) -> Vec<DriverAction> {
        let now = self.env.now();

        self.typing
            .expire(now)
            .into_iter()
            .map(|(conversation_id, user_id)| stop_typing_broadcast(conversation_id, user_id))
            .collect()
    }

    /// Fan a persisted message out to its conversation room and the
    /// receiver's personal room.
    ///
    /// Two broadcasts on purpose: the conversation room reaches everyone
    /// actively viewing the thread, the personal room reaches the receiver's
    /// other tabs for unread badges. A receiver in both rooms gets the event
    /// twice and deduplicates by message id client-side.
    pub fn publish_message(&self, message: &Message) -> Vec<DriverAction> {
        vec![
            DriverAction::Broadcast {
                room: RoomKey::Conversation(message.conversation_id.clone()),
                event: ServerEvent::NewMessage(message.clone()),
            },
            DriverAction::Broadcast {
                room: RoomKey::User(message.receiver_id.clone()),
                event: ServerEvent::NewMessage(message.clone()),
            },
        ]
    }

    /// Broadcast a read receipt to the conversation room.
    pub fn publish_read_receipt(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        user_id: UserId,
    ) -> Vec<DriverAction> {
        vec![DriverAction::Broadcast {
            room: RoomKey::Conversation(conversation_id.clone()),
            event: ServerEvent::MessageRead { conversation_id, message_id, user_id },
        }]
    }

    /// Push an order status change to the affected user's personal room.
    pub fn publish_order_status(
        &self,
        user_id: UserId,
        order_id: OrderId,
        status: String,
        message: String,
    ) -> Vec<DriverAction> {
        vec![DriverAction::Broadcast {
            room: RoomKey::User(user_id),
            event: ServerEvent::OrderStatusChanged { order_id, status, message },
        }]
    }

    /// Push a general notification to the user's personal room.
    pub fn publish_notification(
        &self,
        user_id: UserId,
        kind: String,
        title: String,
        message: String,
    ) -> Vec<DriverAction> {
        vec![DriverAction::Broadcast {
            room: RoomKey::User(user_id),
            event: ServerEvent::Notification { kind, title, message },
        }]
    }

    /// All connections currently in a room.
    pub fn connections_in_room(&self, room: &RoomKey) -> impl Iterator<Item = ConnectionId> + '_ {
        self.rooms.members(room)
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    /// Whether the user has any live connections.
    #[must_use]
    pub fn user_is_connected(&self, user_id: &UserId) -> bool {
        self.registry.user_is_connected(user_id)
    }

    /// Whether a typing burst is active for this pair.
    #[must_use]
    pub fn is_typing(&self, conversation_id: &ConversationId, user_id: &UserId) -> bool {
        self.typing.is_typing(conversation_id, user_id)
    }

    /// Whether the connection is bound to this user.
    ///
    /// Typing payloads carry a `user_id`; a connection may only signal for
    /// the identity it authenticated as.
    fn connection_speaks_for(&self, connection_id: ConnectionId, user_id: &UserId) -> bool {
        self.registry.user_of(connection_id) == Some(user_id)
    }
}

impl<E> std::fmt::Debug for ServerDriver<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("connection_count", &self.registry.connection_count())
            .field("room_count", &self.rooms.room_count())
            .field("typing_count", &self.typing.active_count())
            .finish()
    }
}

fn stop_typing_broadcast(conversation_id: ConversationId, user_id: UserId) -> DriverAction {
    DriverAction::Broadcast {
        room: RoomKey::Conversation(conversation_id.clone()),
        event: ServerEvent::UserStopTyping { conversation_id, user_id },
    }
}

fn unauthenticated(connection_id: ConnectionId, event_name: &str) -> DriverAction {
    DriverAction::Log {
        level: LogLevel::Warn,
        message: format!("{event_name} from unauthenticated connection {connection_id}, dropping"),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::Instant,
    };

    use super::*;

    /// Environment with a hand-advanced clock.
    #[derive(Clone)]
    struct TestEnv {
        start: Instant,
        offset_ms: Arc<AtomicU64>,
    }

    impl TestEnv {
        fn new() -> Self {
            Self { start: Instant::now(), offset_ms: Arc::new(AtomicU64::new(0)) }
        }

        fn advance(&self, duration: Duration) {
            let millis = u64::try_from(duration.as_millis()).unwrap();
            self.offset_ms.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.start + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            use rand::RngCore;
            rand::thread_rng().fill_bytes(buffer);
        }
    }

    fn driver() -> (ServerDriver<TestEnv>, TestEnv) {
        let env = TestEnv::new();
        (ServerDriver::new(env.clone(), DriverConfig::default()), env)
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn accept(driver: &mut ServerDriver<TestEnv>, id: u64) {
        driver.process_event(DriverEvent::ConnectionAccepted { connection_id: conn(id) }).unwrap();
    }

    fn authenticate(driver: &mut ServerDriver<TestEnv>, id: u64, user: &str) {
        driver
            .process_event(DriverEvent::EventReceived {
                connection_id: conn(id),
                event: ClientEvent::JoinUserRoom { user_id: UserId::from(user) },
            })
            .unwrap();
    }

    fn join(driver: &mut ServerDriver<TestEnv>, id: u64, conversation: &str) {
        driver
            .process_event(DriverEvent::EventReceived {
                connection_id: conn(id),
                event: ClientEvent::JoinConversation {
                    conversation_id: ConversationId::from(conversation),
                },
            })
            .unwrap();
    }

    fn typing_start(driver: &mut ServerDriver<TestEnv>, id: u64, conversation: &str, user: &str) -> Vec<DriverAction> {
        driver
            .process_event(DriverEvent::EventReceived {
                connection_id: conn(id),
                event: ClientEvent::TypingStart {
                    conversation_id: ConversationId::from(conversation),
                    user_id: UserId::from(user),
                    username: user.to_string(),
                },
            })
            .unwrap()
    }

    fn broadcasts(actions: &[DriverAction]) -> Vec<(&RoomKey, &ServerEvent)> {
        actions
            .iter()
            .filter_map(|action| match action {
                DriverAction::Broadcast { room, event } => Some((room, event)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn accepts_connection() {
        let (mut driver, _env) = driver();

        let actions = driver
            .process_event(DriverEvent::ConnectionAccepted { connection_id: conn(1) })
            .unwrap();

        assert_eq!(driver.connection_count(), 1);
        assert!(matches!(actions[0], DriverAction::Log { level: LogLevel::Debug, .. }));
    }

    #[test]
    fn rejects_when_max_connections_exceeded() {
        let env = TestEnv::new();
        let config = DriverConfig { max_connections: 2, ..Default::default() };
        let mut driver = ServerDriver::new(env, config);

        accept(&mut driver, 1);
        accept(&mut driver, 2);

        let actions = driver
            .process_event(DriverEvent::ConnectionAccepted { connection_id: conn(3) })
            .unwrap();

        assert_eq!(driver.connection_count(), 2);
        assert!(matches!(actions[0], DriverAction::CloseConnection { .. }));
    }

    #[test]
    fn event_for_unknown_connection_is_an_error() {
        let (mut driver, _env) = driver();

        let result = driver.process_event(DriverEvent::EventReceived {
            connection_id: conn(9),
            event: ClientEvent::JoinUserRoom { user_id: UserId::from("alice") },
        });

        assert!(matches!(result, Err(DriverError::ConnectionNotFound(_))));
    }

    #[test]
    fn join_user_room_binds_identity_and_joins_personal_room() {
        let (mut driver, _env) = driver();

        accept(&mut driver, 1);
        authenticate(&mut driver, 1, "alice");

        assert!(driver.user_is_connected(&UserId::from("alice")));
        let members: Vec<_> =
            driver.connections_in_room(&RoomKey::User(UserId::from("alice"))).collect();
        assert_eq!(members, vec![conn(1)]);
    }

    #[test]
    fn join_conversation_requires_authentication() {
        let (mut driver, _env) = driver();

        accept(&mut driver, 1);
        let actions = driver
            .process_event(DriverEvent::EventReceived {
                connection_id: conn(1),
                event: ClientEvent::JoinConversation { conversation_id: ConversationId::from("c1") },
            })
            .unwrap();

        assert!(matches!(actions[0], DriverAction::Log { level: LogLevel::Warn, .. }));
        assert_eq!(
            driver.connections_in_room(&RoomKey::Conversation(ConversationId::from("c1"))).count(),
            0
        );
    }

    #[test]
    fn typing_start_broadcasts_once_per_burst() {
        let (mut driver, _env) = driver();

        accept(&mut driver, 1);
        authenticate(&mut driver, 1, "alice");
        join(&mut driver, 1, "c1");

        let first = typing_start(&mut driver, 1, "c1", "alice");
        assert_eq!(broadcasts(&first).len(), 1);
        assert!(matches!(
            broadcasts(&first)[0].1,
            ServerEvent::UserTyping { .. }
        ));

        // Renewal is silent.
        let second = typing_start(&mut driver, 1, "c1", "alice");
        assert!(broadcasts(&second).is_empty());
    }

    #[test]
    fn typing_for_another_identity_is_dropped() {
        let (mut driver, _env) = driver();

        accept(&mut driver, 1);
        authenticate(&mut driver, 1, "alice");

        let actions = typing_start(&mut driver, 1, "c1", "mallory");

        assert!(broadcasts(&actions).is_empty());
        assert!(!driver.is_typing(&ConversationId::from("c1"), &UserId::from("mallory")));
    }

    #[test]
    fn typing_expires_on_tick_after_window() {
        let (mut driver, env) = driver();

        accept(&mut driver, 1);
        authenticate(&mut driver, 1, "alice");
        typing_start(&mut driver, 1, "c1", "alice");

        env.advance(Duration::from_millis(999));
        assert!(driver.process_event(DriverEvent::Tick).unwrap().is_empty());

        env.advance(Duration::from_millis(1));
        let actions = driver.process_event(DriverEvent::Tick).unwrap();
        let stops = broadcasts(&actions);
        assert_eq!(stops.len(), 1);
        assert!(matches!(stops[0].1, ServerEvent::UserStopTyping { .. }));

        // Once expired, further ticks stay silent.
        env.advance(Duration::from_millis(1000));
        assert!(driver.process_event(DriverEvent::Tick).unwrap().is_empty());
    }

    #[test]
    fn renewal_defers_expiry() {
        let (mut driver, env) = driver();

        accept(&mut driver, 1);
        authenticate(&mut driver, 1, "alice");
        typing_start(&mut driver, 1, "c1", "alice");

        env.advance(Duration::from_millis(800));
        typing_start(&mut driver, 1, "c1", "alice");

        env.advance(Duration::from_millis(400));
        assert!(driver.process_event(DriverEvent::Tick).unwrap().is_empty());

        env.advance(Duration::from_millis(600));
        assert_eq!(driver.process_event(DriverEvent::Tick).unwrap().len(), 1);
    }

    #[test]
    fn explicit_stop_broadcasts_and_disarms_expiry() {
        let (mut driver, env) = driver();

        accept(&mut driver, 1);
        authenticate(&mut driver, 1, "alice");
        typing_start(&mut driver, 1, "c1", "alice");

        let actions = driver
            .process_event(DriverEvent::EventReceived {
                connection_id: conn(1),
                event: ClientEvent::TypingStop {
                    conversation_id: ConversationId::from("c1"),
                    user_id: UserId::from("alice"),
                },
            })
            .unwrap();
        assert_eq!(broadcasts(&actions).len(), 1);

        env.advance(Duration::from_millis(2000));
        assert!(driver.process_event(DriverEvent::Tick).unwrap().is_empty());
    }

    #[test]
    fn close_cleans_rooms_and_ends_typing() {
        let (mut driver, _env) = driver();

        accept(&mut driver, 1);
        authenticate(&mut driver, 1, "alice");
        join(&mut driver, 1, "c1");
        typing_start(&mut driver, 1, "c1", "alice");

        let actions = driver
            .process_event(DriverEvent::ConnectionClosed {
                connection_id: conn(1),
                reason: "peer disconnected".to_string(),
            })
            .unwrap();

        // Typing stop broadcast for the orphaned burst.
        assert_eq!(broadcasts(&actions).len(), 1);
        assert_eq!(driver.connection_count(), 0);
        assert_eq!(
            driver.connections_in_room(&RoomKey::Conversation(ConversationId::from("c1"))).count(),
            0
        );
        assert!(!driver.user_is_connected(&UserId::from("alice")));
    }

    #[test]
    fn typing_survives_while_another_tab_remains() {
        let (mut driver, _env) = driver();

        accept(&mut driver, 1);
        accept(&mut driver, 2);
        authenticate(&mut driver, 1, "alice");
        authenticate(&mut driver, 2, "alice");
        typing_start(&mut driver, 1, "c1", "alice");

        let actions = driver
            .process_event(DriverEvent::ConnectionClosed {
                connection_id: conn(2),
                reason: "tab closed".to_string(),
            })
            .unwrap();

        // Alice still has a live connection, so the burst stays armed.
        assert!(broadcasts(&actions).is_empty());
        assert!(driver.is_typing(&ConversationId::from("c1"), &UserId::from("alice")));
    }

    #[test]
    fn duplicate_close_is_a_noop() {
        let (mut driver, _env) = driver();

        accept(&mut driver, 1);
        driver
            .process_event(DriverEvent::ConnectionClosed {
                connection_id: conn(1),
                reason: "gone".to_string(),
            })
            .unwrap();

        let actions = driver
            .process_event(DriverEvent::ConnectionClosed {
                connection_id: conn(1),
                reason: "gone again".to_string(),
            })
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn publish_message_targets_conversation_and_receiver_rooms() {
        let (driver, _env) = driver();

        let message = Message {
            id: MessageId::from("m-1"),
            conversation_id: ConversationId::from("c1"),
            sender_id: UserId::from("alice"),
            receiver_id: UserId::from("bob"),
            content: "hello".to_string(),
            attachments: Vec::new(),
            created_at: 1,
            read_by: Vec::new(),
        };

        let actions = driver.publish_message(&message);
        let rooms: Vec<_> = broadcasts(&actions).into_iter().map(|(room, _)| room.clone()).collect();

        assert_eq!(rooms, vec![
            RoomKey::Conversation(ConversationId::from("c1")),
            RoomKey::User(UserId::from("bob")),
        ]);
    }

    #[test]
    fn publish_read_receipt_targets_conversation_room() {
        let (driver, _env) = driver();

        let actions = driver.publish_read_receipt(
            ConversationId::from("c1"),
            MessageId::from("m-1"),
            UserId::from("bob"),
        );

        let targets = broadcasts(&actions);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, &RoomKey::Conversation(ConversationId::from("c1")));
        assert!(matches!(targets[0].1, ServerEvent::MessageRead { .. }));
    }

    #[test]
    fn order_and_notification_target_personal_room() {
        let (driver, _env) = driver();
        let bob = UserId::from("bob");

        let order = driver.publish_order_status(
            bob.clone(),
            OrderId::from("o-1"),
            "delivered".to_string(),
            "Your order was delivered".to_string(),
        );
        let note = driver.publish_notification(
            bob.clone(),
            "review".to_string(),
            "New review".to_string(),
            "You received a 5-star review".to_string(),
        );

        for actions in [order, note] {
            let targets = broadcasts(&actions);
            assert_eq!(targets.len(), 1);
            assert_eq!(targets[0].0, &RoomKey::User(bob.clone()));
        }
    }
}
