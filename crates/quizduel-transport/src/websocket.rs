//! WebSocket push channel over `tokio-tungstenite`.
//!
//! Each accepted socket is split into a read half and a write half guarded
//! by separate locks. The handler parks on `recv` while room events are
//! written through `send` from the connection's writer task.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message, error::ProtocolError};

use crate::{Connection, ConnectionId, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Listens for players on a TCP address and upgrades them to WebSocket.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "listening for players");
        Ok(Self { listener })
    }

    /// The bound address. Useful after binding to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<WebSocketConnection, TransportError> {
        let (socket, peer) = self.listener.accept().await.map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(socket)
            .await
            .map_err(|e| TransportError::AcceptFailed(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "websocket handshake complete");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        tracing::debug!("listener shut down");
        Ok(())
    }
}

/// One player's WebSocket.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| map_ws_error(e, TransportError::SendFailed))
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Frames go out as text: every payload is a JSON envelope.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.write(msg).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Ok(Some(text.as_bytes().to_vec())),
                Ok(Message::Binary(data)) => return Ok(Some(data.to_vec())),
                Ok(Message::Close(_)) => return Ok(None),
                // tungstenite answers pings itself
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => {
                    return match map_ws_error(e, TransportError::ReceiveFailed) {
                        // A peer that vanished without a close frame is still just gone.
                        TransportError::ConnectionClosed(reason) => {
                            tracing::debug!(id = %self.id, %reason, "peer dropped");
                            Ok(None)
                        }
                        other => Err(other),
                    };
                }
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self.write(Message::Close(None)).await {
            Err(TransportError::ConnectionClosed(_)) => Ok(()),
            result => result,
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

/// Sorts tungstenite failures into "the peer is gone" and real I/O errors.
fn map_ws_error(err: tungstenite::Error, io_failure: fn(io::Error) -> TransportError) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::ConnectionClosed(err.to_string())
        }
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            TransportError::ConnectionClosed(err.to_string())
        }
        tungstenite::Error::Io(io) => io_failure(io),
        other => io_failure(io::Error::other(other)),
    }
}
