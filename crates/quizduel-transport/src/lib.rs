//! Push-channel transport for quizduel.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the server
//! speaks to, plus a WebSocket implementation. The layers above only see
//! opaque byte frames and a [`ConnectionId`]; the user registry keys its
//! reverse index on that id.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Process-unique identifier for one live connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws#{}", self.0)
    }
}

/// A listener handing out connections.
///
/// Futures are `Send` so the accept loop can itself run in a spawned task.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client and completes its handshake.
    fn accept(&mut self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;

    /// Stops accepting. Connections already handed out stay open.
    fn shutdown(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// One client's frame pipe.
///
/// `send` and `recv` may be called concurrently from different tasks:
/// room pushes go out while the reader is parked waiting for the next
/// client request.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame. `Ok(None)` means the peer closed cleanly.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Says goodbye to the peer.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn id(&self) -> ConnectionId;

    /// Remote address, for logs.
    fn peer_addr(&self) -> SocketAddr;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display_is_short_log_tag() {
        assert_eq!(ConnectionId::new(7).to_string(), "ws#7");
    }

    #[test]
    fn test_connection_id_orders_by_accept_order() {
        let mut ids = vec![ConnectionId::new(3), ConnectionId::new(1), ConnectionId::new(2)];
        ids.sort();
        let raw: Vec<u64> = ids.into_iter().map(ConnectionId::into_inner).collect();
        assert_eq!(raw, [1, 2, 3]);
    }

    #[test]
    fn test_connection_id_keys_reverse_index() {
        let mut owner_of = std::collections::HashMap::new();
        owner_of.insert(ConnectionId::new(1), "first tab");
        owner_of.insert(ConnectionId::new(2), "second tab");
        assert_eq!(owner_of.get(&ConnectionId::new(2)), Some(&"second tab"));
        assert_eq!(owner_of.get(&ConnectionId::new(9)), None);
    }
}
