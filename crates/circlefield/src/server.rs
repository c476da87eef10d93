//! `CirclefieldServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room registry.

use std::sync::Arc;
use std::time::Instant;

use circlefield_game::ArenaConfig;
use circlefield_protocol::{Codec, JsonCodec};
use circlefield_room::RoomRegistry;
use circlefield_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::CirclefieldError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection task.
///
/// Owned by the server and shared through an `Arc`; there is no
/// process-wide room table.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) codec: C,
    /// Origin of every envelope timestamp.
    pub(crate) started: Instant,
}

impl<C: Codec> ServerState<C> {
    /// Milliseconds since the server started.
    pub(crate) fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Circlefield server.
///
/// # Example
///
/// ```rust,no_run
/// use circlefield::prelude::*;
///
/// # async fn run() -> Result<(), CirclefieldError> {
/// let server = CirclefieldServer::builder()
///     .bind("0.0.0.0:3000")
///     .arena(ArenaConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct CirclefieldServerBuilder {
    bind_addr: String,
    arena: ArenaConfig,
}

impl CirclefieldServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            arena: ArenaConfig::default(),
        }
    }

    /// Sets the address to listen on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the arena every room on this server is created with.
    pub fn arena(mut self, arena: ArenaConfig) -> Self {
        self.arena = arena;
        self
    }

    /// Validates the arena config and binds the listener.
    ///
    /// Uses `WebSocketTransport` and `JsonCodec`.
    pub async fn build(self) -> Result<CirclefieldServer<JsonCodec>, CirclefieldError> {
        self.arena
            .validate()
            .map_err(|e| CirclefieldError::Config(e.to_string()))?;

        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomRegistry::new(self.arena)),
            codec: JsonCodec,
            started: Instant::now(),
        });

        Ok(CirclefieldServer { transport, state })
    }
}

impl Default for CirclefieldServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Circlefield server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CirclefieldServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl CirclefieldServer<JsonCodec> {
    pub fn builder() -> CirclefieldServerBuilder {
        CirclefieldServerBuilder::new()
    }
}

impl<C: Codec> CirclefieldServer<C> {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop, spawning one handler task per connection.
    ///
    /// A failed accept is logged and the loop carries on; this only
    /// returns if the process is torn down around it.
    pub async fn run(mut self) -> Result<(), CirclefieldError> {
        tracing::info!(addr = ?self.local_addr().ok(), "circlefield server running");

        loop {
            match self.transport.accept().await {
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
            }
        }
    }
}
