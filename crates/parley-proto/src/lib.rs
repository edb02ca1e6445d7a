//! Parley wire protocol.
//!
//! Single source of truth for event names and payload shapes shared by the
//! server and client, so the two never drift. Events are a closed enumeration:
//! the dispatcher matches exhaustively and unknown or malformed events are
//! rejected at decode time rather than at runtime.
//!
//! # Wire format
//!
//! One JSON object per WebSocket text frame:
//!
//! ```json
//! {"event": "join_conversation", "data": {"conversation_id": "conv-42"}}
//! ```
//!
//! The `event` tag selects the payload shape. Payloads use serde, so adding a
//! variant forces every `match` in the codebase to be updated.

mod error;
mod event;
mod ids;
mod message;

pub use error::ProtocolError;
pub use event::{ClientEvent, ServerEvent};
pub use ids::{ConnectionId, ConversationId, MessageId, OrderId, RoomKey, UserId};
pub use message::{Attachment, Conversation, Message};
