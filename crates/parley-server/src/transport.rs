//! WebSocket transport.
//!
//! Thin wrapper over a TCP listener plus the tungstenite handshake. All
//! framing above this point is JSON text messages; binary frames are ignored
//! by the read loop in `lib.rs`.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{WebSocketStream, accept_async};

use crate::error::ServerError;

/// WebSocket listener bound to a local address.
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind to the given address (e.g. `"0.0.0.0:8900"`).
    pub async fn bind(bind_address: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| ServerError::Config(format!("failed to bind {bind_address}: {e}")))?;
        Ok(Self { listener })
    }

    /// Accept one connection and complete the WebSocket handshake.
    pub async fn accept(&self) -> Result<(WebSocketStream<TcpStream>, SocketAddr), ServerError> {
        let (stream, peer_addr) = self.listener.accept().await?;
        let ws = accept_async(stream).await?;
        Ok((ws, peer_addr))
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_to_ephemeral_port() {
        let transport = WsTransport::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(transport.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn bind_to_invalid_address_fails() {
        let result = WsTransport::bind("not an address").await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }
}
