//! Runtime error types.

use std::fmt;

use crate::driver_error::DriverError;

/// Errors that can occur in the production runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Invalid runtime configuration.
    ///
    /// Bad bind address, zero tick interval, etc. Fatal at startup.
    Config(String),

    /// Transport failure.
    ///
    /// Socket bind/accept failures or a broken WebSocket handshake. May be
    /// transient (network issues) or fatal (port in use). Check the message.
    Transport(String),

    /// Driver bookkeeping error.
    ///
    /// The driver was fed an event for a connection it does not know about.
    Driver(DriverError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Driver(err) => write!(f, "driver error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for ServerError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ServerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::ConnectionId;

    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("invalid bind address".to_string());
        assert_eq!(err.to_string(), "config error: invalid bind address");

        let err = ServerError::Driver(DriverError::ConnectionNotFound(ConnectionId::new(0x2a)));
        assert_eq!(err.to_string(), "driver error: connection not found: 000000000000002a");
    }
}
