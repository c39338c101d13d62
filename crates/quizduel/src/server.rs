//! `QuizduelServer` builder and accept loop.
//!
//! This is the entry point for running a quizduel server. It ties
//! together all the layers: transport → protocol → registry → rooms.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use quizduel_protocol::{Codec, JsonCodec};
use quizduel_questions::{ProviderConfig, QuestionSetProvider, QuestionSource};
use quizduel_room::{RoomConfig, RoomManager};
use quizduel_session::UserRegistry;
use quizduel_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::QuizduelError;
use crate::config::{DEFAULT_IDLE_TIMEOUT, ServerConfig};
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry lock is never held while waiting on a room.
pub(crate) struct ServerState<Q: QuestionSource, C: Codec> {
    pub(crate) users: Mutex<UserRegistry>,
    pub(crate) rooms: RoomManager<Q>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a quizduel server.
///
/// # Example
///
/// ```rust,ignore
/// let server = QuizduelServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(QuestionBank::new())
///     .await?;
/// server.run().await
/// ```
pub struct QuizduelServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    provider_config: ProviderConfig,
    idle_timeout: Duration,
}

impl QuizduelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            provider_config: ProviderConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Takes address, room, provider and idle settings from a loaded config.
    pub fn config(self, config: &ServerConfig) -> Self {
        self.bind(&config.bind)
            .room_config(config.room.clone())
            .provider_config(config.provider)
            .idle_timeout(config.idle_timeout)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn provider_config(mut self, config: ProviderConfig) -> Self {
        self.provider_config = config;
        self
    }

    /// Closes connections that send nothing for this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the server around `source`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<Q: QuestionSource>(self, source: Q) -> Result<QuizduelServer<Q, JsonCodec>, QuizduelError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let provider = QuestionSetProvider::with_config(source, self.provider_config.validated());
        let state = Arc::new(ServerState {
            users: Mutex::new(UserRegistry::new()),
            rooms: RoomManager::new(provider, self.room_config),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(QuizduelServer { transport, state })
    }
}

impl Default for QuizduelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound quizduel server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuizduelServer<Q: QuestionSource, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<Q, C>>,
}

impl<Q, C> QuizduelServer<Q, C>
where
    Q: QuestionSource,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), QuizduelError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `signal` resolves, then closes every
    /// room so its players are told.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) -> Result<(), QuizduelError> {
        tracing::info!("quizduel server running");
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut signal => break,
            }
        }

        tracing::info!("shutting down");
        self.state.rooms.shutdown().await;
        self.transport.shutdown().await?;
        Ok(())
    }
}
