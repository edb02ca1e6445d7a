//! Protocol error types.

/// Errors from event encoding, decoding, and validation.
///
/// Malformed inbound events are dropped by the dispatcher (fire-and-forget
/// model, no error reply), so these errors only ever reach a log line.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// JSON parse or serialize failure, including unknown event tags.
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A required identifier field was present but empty.
    #[error("missing or empty field: {0}")]
    EmptyField(&'static str),
}
