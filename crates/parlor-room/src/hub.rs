//! The room hub: access-checked entry point for every room operation.
//!
//! The hub owns one [`RoomHandle`] per configured room. The handle map
//! is built at startup and never changes, so no lock guards it —
//! concurrent operations on different rooms proceed independently.
//!
//! Authorization is decided here, before anything reaches a room
//! actor. Denials are not errors: they resolve to `Denied`, leave the
//! target room untouched, and are recorded in the ADMIN room's audit
//! trail instead.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_protocol::{Message, RoomCode};
use parlor_session::Identity;
use parlor_store::MessageLog;
use parlor_transport::ConnectionId;

use crate::room::spawn_room;
use crate::{HubConfig, OutboundSender, RoomDirectory, RoomError, RoomHandle};

/// The result of an access-checked join.
#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection is now a member.
    Joined,
    /// Access denied; the member set is unchanged and the denial was
    /// audited. The client is not told.
    Denied,
}

/// The result of an access-checked broadcast.
#[derive(Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The message was appended and fanned out.
    Delivered(Message),
    /// Access denied; nothing was appended or delivered to the target
    /// room, and the denial was audited.
    Denied,
}

/// Routes join/leave/broadcast requests to per-room actors, enforcing
/// access control and writing the audit trail.
pub struct RoomHub {
    rooms: HashMap<RoomCode, RoomHandle>,
    directory: Arc<RoomDirectory>,
    config: HubConfig,
}

impl RoomHub {
    /// Spawns one room actor per directory entry (the ADMIN room
    /// included) and returns the hub.
    pub fn new(
        directory: Arc<RoomDirectory>,
        log: Arc<dyn MessageLog>,
        config: HubConfig,
    ) -> Self {
        let rooms = directory
            .entries()
            .iter()
            .map(|entry| {
                let handle = spawn_room(
                    entry.room_code.clone(),
                    entry.display_name.clone(),
                    log.clone(),
                    config.clone(),
                );
                (entry.room_code.clone(), handle)
            })
            .collect();
        tracing::info!(
            rooms = directory.entries().len(),
            "room hub started"
        );
        Self {
            rooms,
            directory,
            config,
        }
    }

    /// The hub's configuration (shared with every room actor).
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// The directory this hub was built from.
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    fn handle(&self, room: &RoomCode) -> Result<&RoomHandle, RoomError> {
        self.rooms
            .get(room)
            .ok_or_else(|| RoomError::UnknownRoom(room.clone()))
    }

    /// Subscribes a connection to a room, if the identity is allowed
    /// in.
    ///
    /// On success the room announces the join to all members, and
    /// (for non-ADMIN rooms) an audit entry lands in the ADMIN room.
    /// On denial only the audit entry is written.
    pub async fn join(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        room: &RoomCode,
        sender: OutboundSender,
    ) -> Result<JoinOutcome, RoomError> {
        let handle = self.handle(room)?;
        let room_name = self
            .directory
            .display_name(room)
            .unwrap_or(room.as_str())
            .to_string();

        if !identity.can_access(room) {
            tracing::warn!(
                %conn,
                username = %identity.username,
                %room,
                "join denied"
            );
            self.audit(
                identity,
                format!(
                    "{} attempted to join room but denied: {}",
                    identity.username, room_name
                ),
            )
            .await;
            return Ok(JoinOutcome::Denied);
        }

        handle.join(conn, &identity.username, sender).await?;

        if !room.is_admin() {
            self.audit(
                identity,
                format!(
                    "{} joined room: {}",
                    identity.username, room_name
                ),
            )
            .await;
        }
        Ok(JoinOutcome::Joined)
    }

    /// Unsubscribes a connection from a room. Idempotent.
    pub async fn leave(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        room: &RoomCode,
    ) -> Result<(), RoomError> {
        self.handle(room)?
            .leave(conn, &identity.username)
            .await
    }

    /// Relays a chat message into a room, if the identity is allowed
    /// in.
    ///
    /// The room actor appends to the log before any member sees the
    /// message. On denial nothing reaches the target room.
    pub async fn broadcast(
        &self,
        identity: &Identity,
        room: &RoomCode,
        text: impl Into<String>,
    ) -> Result<BroadcastOutcome, RoomError> {
        let handle = self.handle(room)?;

        if !identity.can_access(room) {
            let room_name = self
                .directory
                .display_name(room)
                .unwrap_or(room.as_str())
                .to_string();
            tracing::warn!(
                username = %identity.username,
                %room,
                "broadcast denied"
            );
            self.audit(
                identity,
                format!(
                    "{} attempted to broadcast but denied: {}",
                    identity.username, room_name
                ),
            )
            .await;
            return Ok(BroadcastOutcome::Denied);
        }

        let stored = handle
            .broadcast(
                &identity.username,
                &identity.display_name,
                text.into(),
            )
            .await?;
        Ok(BroadcastOutcome::Delivered(stored))
    }

    /// Snapshots a room's current member set.
    pub async fn members_of(
        &self,
        room: &RoomCode,
    ) -> Result<Vec<ConnectionId>, RoomError> {
        self.handle(room)?.members().await
    }

    /// Removes a connection from every room, without announcements.
    ///
    /// Called on disconnect; each room actor applies the removal
    /// atomically with respect to its own broadcasts.
    pub async fn drop_connection(&self, conn: ConnectionId) {
        for handle in self.rooms.values() {
            handle.drop_connection(conn).await;
        }
    }

    /// Writes an audit message to the ADMIN room on behalf of a user.
    ///
    /// Audits are appended to the log and fanned out to whoever is
    /// subscribed to ADMIN. An audit that can't be written is logged
    /// and swallowed — auditing never fails the audited operation.
    pub async fn audit(&self, identity: &Identity, text: String) {
        let Some(handle) = self.rooms.get(&RoomCode::admin()) else {
            tracing::error!("no ADMIN room, audit entry lost");
            return;
        };
        if let Err(e) = handle
            .broadcast(&identity.username, &identity.display_name, text)
            .await
        {
            tracing::error!(error = %e, "failed to write audit entry");
        }
    }
}
