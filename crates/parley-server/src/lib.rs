//! Parley production server.
//!
//! Production runtime for the real-time conversation layer: WebSocket
//! transport over Tokio, JSON text framing, system time and cryptographic
//! RNG.
//!
//! # Architecture
//!
//! This crate provides production "glue" around an action-based core. The
//! [`ServerDriver`] is pure logic (Sans-IO): it consumes [`DriverEvent`]s and
//! emits [`DriverAction`]s, while [`Server`] owns the sockets and executes
//! the actions. Everything order-sensitive goes through one unbounded queue
//! per connection, so a client always observes events in the order the driver
//! emitted them.
//!
//! # Components
//!
//! - [`ServerDriver`]: event dispatch, room membership, typing state (no I/O)
//! - [`Server`]: production runtime that executes driver actions
//! - [`Publisher`]: application-facing handle for persisted-event fan-out
//! - [`WsTransport`]: WebSocket listener
//! - [`SystemEnv`]: production environment (real time, crypto RNG)

mod driver;
mod driver_error;
mod error;
mod registry;
mod rooms;
mod system_env;
mod transport;
mod typing;

use std::{collections::HashMap, sync::Arc, time::Duration};

pub use driver::{DriverAction, DriverConfig, DriverEvent, LogLevel, ServerDriver};
pub use driver_error::DriverError;
pub use error::ServerError;
use futures_util::{SinkExt, StreamExt};
use parley_core::{Environment, Publish};
use parley_proto::{
    ClientEvent, ConnectionId, ConversationId, Message, MessageId, OrderId, UserId,
};
pub use registry::{ConnectionInfo, ConnectionRegistry};
pub use rooms::RoomMembership;
pub use system_env::SystemEnv;
use tokio::{
    net::TcpStream,
    sync::{RwLock, mpsc},
};
use tokio_tungstenite::{WebSocketStream, tungstenite::Message as WsMessage};
pub use transport::WsTransport;
pub use typing::{TYPING_EXPIRY, TypingTracker};

/// Shared state for all connections.
struct SharedState {
    /// Connection ID → outbound message queue.
    ///
    /// All events to a client go through this single queue, ensuring
    /// ordering; a dedicated writer task drains it into the socket.
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<WsMessage>>>,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g. `"0.0.0.0:8900"`).
    pub bind_address: String,
    /// Driver configuration (limits, typing expiry).
    pub driver: DriverConfig,
    /// Interval between typing-expiry ticks.
    pub tick_interval: Duration,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8900".to_string(),
            driver: DriverConfig::default(),
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// Commands from the application layer into the fan-out engine.
#[derive(Debug)]
enum PublishCommand {
    Message(Message),
    ReadReceipt { conversation_id: ConversationId, message_id: MessageId, user_id: UserId },
    OrderStatus { user_id: UserId, order_id: OrderId, status: String, message: String },
    Notification { user_id: UserId, kind: String, title: String, message: String },
}

/// Application-facing publish handle.
///
/// Cheap to clone; hand one to the REST layer's message pipeline. Commands
/// are queued and executed on the server's event loop, so publishing never
/// blocks the caller. Input is trusted to be already persisted - the
/// pipeline in `parley-core` enforces persist-then-publish.
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<PublishCommand>,
}

impl Publisher {
    fn send(&self, command: PublishCommand) {
        // Only fails after the server shut down; drop the event.
        if self.tx.send(command).is_err() {
            tracing::debug!("publish after server shutdown, dropping event");
        }
    }

    /// Push an order status change to the affected user's personal room.
    pub fn publish_order_status(
        &self,
        user_id: UserId,
        order_id: OrderId,
        status: String,
        message: String,
    ) {
        self.send(PublishCommand::OrderStatus { user_id, order_id, status, message });
    }

    /// Push a general notification to the user's personal room.
    pub fn publish_notification(&self, user_id: UserId, kind: String, title: String, message: String) {
        self.send(PublishCommand::Notification { user_id, kind, title, message });
    }
}

impl Publish for Publisher {
    fn publish_message(&self, message: Message) {
        self.send(PublishCommand::Message(message));
    }

    fn publish_read_receipt(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        user_id: UserId,
    ) {
        self.send(PublishCommand::ReadReceipt { conversation_id, message_id, user_id });
    }
}

/// Production Parley server.
///
/// Wraps [`ServerDriver`] with WebSocket transport and system environment.
pub struct Server {
    driver: Arc<tokio::sync::Mutex<ServerDriver<SystemEnv>>>,
    transport: WsTransport,
    shared: Arc<SharedState>,
    env: SystemEnv,
    tick_interval: Duration,
    publish_tx: mpsc::UnboundedSender<PublishCommand>,
    publish_rx: mpsc::UnboundedReceiver<PublishCommand>,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.tick_interval.is_zero() {
            return Err(ServerError::Config("tick interval must be non-zero".to_string()));
        }

        let env = SystemEnv::new();
        let driver = ServerDriver::new(env.clone(), config.driver);
        let transport = WsTransport::bind(&config.bind_address).await?;
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();

        Ok(Self {
            driver: Arc::new(tokio::sync::Mutex::new(driver)),
            transport,
            shared: Arc::new(SharedState { senders: RwLock::new(HashMap::new()) }),
            env,
            tick_interval: config.tick_interval,
            publish_tx,
            publish_rx,
        })
    }

    /// Publish handle for the application layer.
    #[must_use]
    pub fn publisher(&self) -> Publisher {
        Publisher { tx: self.publish_tx.clone() }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the server, accepting connections and dispatching events.
    ///
    /// Runs until the process is shut down or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("server listening on {}", self.transport.local_addr()?);

        let driver = self.driver;
        let shared = self.shared;
        let env = self.env;

        // Typing-expiry tick loop.
        {
            let driver = Arc::clone(&driver);
            let shared = Arc::clone(&shared);
            let env = env.clone();
            let tick_interval = self.tick_interval;

            tokio::spawn(async move {
                loop {
                    env.sleep(tick_interval).await;

                    let mut driver = driver.lock().await;
                    match driver.process_event(DriverEvent::Tick) {
                        Ok(actions) => execute_actions(&driver, actions, &shared).await,
                        Err(e) => tracing::error!("tick processing failed: {}", e),
                    }
                }
            });
        }

        // Application publish loop.
        {
            let driver = Arc::clone(&driver);
            let shared = Arc::clone(&shared);
            let mut publish_rx = self.publish_rx;

            tokio::spawn(async move {
                while let Some(command) = publish_rx.recv().await {
                    let driver = driver.lock().await;
                    let actions = match command {
                        PublishCommand::Message(message) => driver.publish_message(&message),
                        PublishCommand::ReadReceipt { conversation_id, message_id, user_id } => {
                            driver.publish_read_receipt(conversation_id, message_id, user_id)
                        },
                        PublishCommand::OrderStatus { user_id, order_id, status, message } => {
                            driver.publish_order_status(user_id, order_id, status, message)
                        },
                        PublishCommand::Notification { user_id, kind, title, message } => {
                            driver.publish_notification(user_id, kind, title, message)
                        },
                    };
                    execute_actions(&driver, actions, &shared).await;
                }
            });
        }

        loop {
            match self.transport.accept().await {
                Ok((ws, peer_addr)) => {
                    let driver = Arc::clone(&driver);
                    let shared = Arc::clone(&shared);
                    let env = env.clone();

                    tokio::spawn(async move {
                        tracing::debug!("accepted connection from {}", peer_addr);
                        if let Err(e) = handle_connection(ws, driver, shared, env).await {
                            tracing::error!("connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                },
            }
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    driver: Arc<tokio::sync::Mutex<ServerDriver<SystemEnv>>>,
    shared: Arc<SharedState>,
    env: SystemEnv,
) -> Result<(), ServerError> {
    let connection_id = ConnectionId::new(env.random_u64());
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    {
        let mut senders = shared.senders.write().await;
        senders.insert(connection_id, tx.clone());
    }

    // Writer task: single consumer of the outbound queue preserves ordering.
    // A queued close frame ends the task once it has been flushed.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, WsMessage::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let admitted = {
        let mut driver = driver.lock().await;
        let actions = driver.process_event(DriverEvent::ConnectionAccepted { connection_id })?;
        let refused = actions.iter().any(|action| {
            matches!(action, DriverAction::CloseConnection { connection_id: id, .. }
                if *id == connection_id)
        });
        execute_actions(&driver, actions, &shared).await;
        !refused
    };

    if !admitted {
        // Refused at accept: wait for the writer to flush the close frame,
        // then drop the socket without entering the read loop. The driver
        // never registered the connection, so there is nothing to tear down.
        let _ = writer.await;
        return Ok(());
    }

    while let Some(message) = stream.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                let event = match ClientEvent::decode(text.as_str()) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(
                            "dropping malformed frame from {}: {}",
                            connection_id,
                            e
                        );
                        continue;
                    },
                };

                tracing::debug!("{} -> {}", connection_id, event.name());

                let mut driver = driver.lock().await;
                match driver.process_event(DriverEvent::EventReceived { connection_id, event }) {
                    Ok(actions) => execute_actions(&driver, actions, &shared).await,
                    Err(e) => tracing::warn!("event processing error: {}", e),
                }
            },
            Ok(WsMessage::Ping(payload)) => {
                let _ = tx.send(WsMessage::Pong(payload));
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {
                // Binary/pong frames are not part of the protocol.
            },
            Err(e) => {
                tracing::debug!("read error on {}: {}", connection_id, e);
                break;
            },
        }
    }

    {
        let mut senders = shared.senders.write().await;
        senders.remove(&connection_id);
    }
    writer.abort();

    {
        let mut driver = driver.lock().await;
        let actions = driver.process_event(DriverEvent::ConnectionClosed {
            connection_id,
            reason: "connection closed".to_string(),
        })?;
        execute_actions(&driver, actions, &shared).await;
    }

    Ok(())
}

/// Execute driver actions against the live connection map.
///
/// Delivery is best-effort per connection: one dead socket never blocks a
/// broadcast to the rest of the room.
async fn execute_actions(
    driver: &ServerDriver<SystemEnv>,
    actions: Vec<DriverAction>,
    shared: &SharedState,
) {
    for action in actions {
        match action {
            DriverAction::Broadcast { room, event } => {
                let members: Vec<ConnectionId> = driver.connections_in_room(&room).collect();
                if members.is_empty() {
                    continue;
                }

                // Encode once per broadcast, not per member.
                let text = match event.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to encode {}: {}", event.name(), e);
                        continue;
                    },
                };

                let senders = shared.senders.read().await;
                for connection_id in members {
                    if let Some(sender) = senders.get(&connection_id) {
                        if sender.send(WsMessage::Text(text.clone().into())).is_err() {
                            tracing::warn!("broadcast send failed for {}", connection_id);
                        }
                    }
                }
            },

            DriverAction::CloseConnection { connection_id, reason } => {
                tracing::info!("closing connection {}: {}", connection_id, reason);
                let mut senders = shared.senders.write().await;
                if let Some(sender) = senders.remove(&connection_id) {
                    // Queued behind any pending events; the writer sends the
                    // close frame and shuts the socket down.
                    let _ = sender.send(WsMessage::Close(None));
                }
            },

            DriverAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}
