//! Sans-IO client state machine for the Parley real-time protocol.
//!
//! The [`Client`] owns connection-scoped state - open conversations, local
//! typing bursts, the seen-message window, and event subscriptions - and
//! produces [`ClientAction`]s for the caller to execute against whatever
//! transport and UI it runs on. It performs no I/O itself, so the same
//! machine drives a production WebSocket and a fully deterministic test.
//!
//! # Example flow
//!
//! ```
//! use parley_client::{Client, ClientAction, ClientCommand, EventKind};
//! use parley_proto::UserId;
//!
//! let mut client: Client = Client::new(UserId::from("alice"), "Alice");
//! let _messages = client.subscribe(EventKind::NewMessage);
//!
//! // Transport came up: the caller writes each Send action to the socket.
//! for action in client.handle(ClientCommand::Connected) {
//!     if let ClientAction::Send(event) = action {
//!         let _frame = event.encode().unwrap();
//!     }
//! }
//! ```

mod client;
mod dispatch;
mod event;

pub use client::{Client, TYPING_IDLE};
pub use dispatch::{Dispatcher, EventKind, SubscriptionId};
pub use event::{ClientAction, ClientCommand};
