//! Room membership and broadcast fan-out for Parlor.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! member set. Appending to the message log and fanning out to members
//! happen inside the actor, so per-room delivery order always matches
//! log order, and activity in one room never contends with another.
//!
//! # Key types
//!
//! - [`RoomDirectory`] — the static set of rooms (code ↔ display name)
//! - [`RoomHub`] — entry point for join/leave/broadcast, consults
//!   access control and writes the ADMIN audit trail
//! - [`RoomHandle`] — sends commands to a running room actor
//! - [`HubConfig`] — queue capacities and append retry policy

mod config;
mod directory;
mod error;
mod hub;
mod room;

pub use config::HubConfig;
pub use directory::RoomDirectory;
pub use error::RoomError;
pub use hub::{BroadcastOutcome, JoinOutcome, RoomHub};
pub use room::{OutboundSender, RoomHandle};
