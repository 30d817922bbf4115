//! # Parlor
//!
//! A real-time, room-scoped chat relay.
//!
//! Authenticated users join named rooms, broadcast messages to
//! everyone in the room, and replay recent history. Every join and
//! broadcast is access-checked against the user's room allow list,
//! and every relayed message is appended to a durable log before any
//! client sees it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parlor::prelude::*;
//!
//! # async fn run() -> Result<(), ParlorError> {
//! let credentials = Arc::new(MemoryCredentialStore::new([
//!     Identity::new("alice", "wonderland", "Alice",
//!         vec![RoomCode::new("LOBBY"), RoomCode::admin()]),
//! ]));
//! let log = Arc::new(MemoryMessageLog::new());
//!
//! let server = ParlorServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .room(RoomCode::new("LOBBY"), "Lobby")
//!     .build(credentials, log)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::ParlorError;
pub use server::{ParlorServer, ParlorServerBuilder};

/// The common imports for wiring up a Parlor server.
pub mod prelude {
    pub use crate::{ParlorError, ParlorServer, ParlorServerBuilder};
    pub use parlor_protocol::{
        ClientEvent, Envelope, JsonCodec, Message, Payload, RoomCode,
        RoomEntry, ServerEvent,
    };
    pub use parlor_room::{HubConfig, RoomDirectory, RoomHub};
    pub use parlor_session::{
        CredentialStore, Identity, MemoryCredentialStore,
        SessionProtection,
    };
    pub use parlor_store::{MemoryMessageLog, MessageLog};
}
