//! Driver-level errors.

use parley_proto::ConnectionId;

/// Errors surfaced by the server driver.
///
/// Most malformed input is handled inside the driver by dropping the event
/// and emitting a warn log action; an error here means the runtime fed the
/// driver an event that violates its own bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// An event referenced a connection the driver does not know about.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),
}
