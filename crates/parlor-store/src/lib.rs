//! The message log: an append-only, per-room record of everything
//! relayed.
//!
//! The log is the source of truth for chat history. Two invariants
//! hold for every backend:
//!
//! - **Append-only** — messages are never updated or deleted, and ids
//!   are strictly increasing in append order.
//! - **Durable before visible** — the broadcast engine appends first
//!   and fans out second, so anything a client saw is in the log.
//!
//! Backends implement the [`MessageLog`] trait:
//! [`MemoryMessageLog`] for development and tests, and
//! [`SqliteMessageLog`] (behind the default `sqlite` feature) for
//! durable deployments.

mod error;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryMessageLog;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMessageLog;

use async_trait::async_trait;
use parlor_protocol::{Message, RoomCode};

/// How many messages a history query returns when the client doesn't
/// say.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Normalizes a client-supplied history limit.
///
/// Absent and zero both fall back to [`DEFAULT_HISTORY_LIMIT`].
pub fn history_limit(requested: Option<u32>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_HISTORY_LIMIT,
        Some(n) => n as usize,
    }
}

/// A message about to be appended: everything except the log-assigned
/// id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Server timestamp, milliseconds since the Unix epoch.
    pub created_at: u64,
    /// The room this message belongs to.
    pub room_code: RoomCode,
    /// Sender's login name.
    pub username: String,
    /// Sender's display name at send time.
    pub display_name: String,
    /// The message body, verbatim.
    pub text: String,
}

/// An append-only per-room message log.
#[async_trait]
pub trait MessageLog: Send + Sync + 'static {
    /// Appends a message, assigning it the next id.
    ///
    /// Ids are strictly increasing in append order, unique across all
    /// rooms.
    async fn append(&self, message: NewMessage)
        -> Result<Message, StoreError>;

    /// Returns the most recent `n` messages for a room, oldest first.
    ///
    /// A room with no messages (including rooms the log has never
    /// seen) yields an empty vector, not an error.
    async fn last_n(
        &self,
        room: &RoomCode,
        n: usize,
    ) -> Result<Vec<Message>, StoreError>;
}
