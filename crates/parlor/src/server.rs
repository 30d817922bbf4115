//! `ParlorServer` builder and accept loop.
//!
//! This is the entry point for running a Parlor chat relay. It ties
//! together all the layers: transport → protocol → session → store →
//! room.

use std::sync::Arc;

use parlor_protocol::{Codec, JsonCodec, RoomCode};
use parlor_room::{HubConfig, RoomDirectory, RoomHub};
use parlor_session::{
    CredentialStore, SessionProtection, SessionRegistry,
};
use parlor_store::MessageLog;
use parlor_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::ParlorError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// session registry sits behind a `Mutex`; the hub manages its own
/// concurrency through per-room actors.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: Mutex<SessionRegistry>,
    pub(crate) hub: RoomHub,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) directory: Arc<RoomDirectory>,
    pub(crate) log: Arc<dyn MessageLog>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,ignore
/// use parlor::prelude::*;
///
/// let server = ParlorServer::builder()
///     .bind("0.0.0.0:8080")
///     .room(RoomCode::new("LOBBY"), "Lobby")
///     .build(credentials, log)
///     .await?;
/// server.run().await
/// ```
pub struct ParlorServerBuilder {
    bind_addr: String,
    protection: SessionProtection,
    hub_config: HubConfig,
    rooms: Vec<(RoomCode, String)>,
}

impl ParlorServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            protection: SessionProtection::default(),
            hub_config: HubConfig::default(),
            rooms: Vec::new(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session protection mode (strict by default).
    pub fn protection(mut self, protection: SessionProtection) -> Self {
        self.protection = protection;
        self
    }

    /// Sets queue capacities and the append retry policy.
    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// Adds one room to the directory.
    pub fn room(
        mut self,
        code: RoomCode,
        display_name: impl Into<String>,
    ) -> Self {
        self.rooms.push((code, display_name.into()));
        self
    }

    /// Adds several rooms to the directory at once.
    pub fn rooms(
        mut self,
        rooms: impl IntoIterator<Item = (RoomCode, String)>,
    ) -> Self {
        self.rooms.extend(rooms);
        self
    }

    /// Builds and starts the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`. The ADMIN room is
    /// created even if not configured, so the audit trail always has
    /// somewhere to go.
    pub async fn build(
        self,
        credentials: Arc<dyn CredentialStore>,
        log: Arc<dyn MessageLog>,
    ) -> Result<ParlorServer<JsonCodec>, ParlorError> {
        let transport =
            WebSocketTransport::bind(&self.bind_addr).await?;

        let directory = Arc::new(RoomDirectory::new(self.rooms));
        let hub = RoomHub::new(
            directory.clone(),
            log.clone(),
            self.hub_config,
        );

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionRegistry::new(self.protection)),
            hub,
            credentials,
            directory,
            log,
            codec: JsonCodec,
        });

        Ok(ParlorServer { transport, state })
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Parlor chat relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParlorServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl ParlorServer<JsonCodec> {
    /// Creates a new builder.
    ///
    /// On a non-generic impl so `ParlorServer::builder()` resolves
    /// without a codec annotation.
    pub fn builder() -> ParlorServerBuilder {
        ParlorServerBuilder::new()
    }
}

impl<C: Codec> ParlorServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ParlorError> {
        self.transport.local_addr().map_err(ParlorError::Transport)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for
    /// each. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        tracing::info!("Parlor server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
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

// =========================================================================
// Tests
// =========================================================================
