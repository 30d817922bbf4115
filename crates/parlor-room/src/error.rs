//! Error types for the room layer.

use parlor_protocol::RoomCode;
use parlor_store::StoreError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists in the directory.
    #[error("room {0} not found")]
    UnknownRoom(RoomCode),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// The message log rejected an append after retries.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
