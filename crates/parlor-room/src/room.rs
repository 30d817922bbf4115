//! Room actor: an isolated Tokio task that owns one room's membership
//! and relays its messages.
//!
//! Each room runs in its own task, communicating with the outside
//! world through an mpsc channel. This is the "actor model" — no
//! shared mutable state, just message passing. Because one task
//! serializes all of a room's commands, a room's log append order and
//! its delivery order are the same thing.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_protocol::{now_millis, Message, RoomCode, ServerEvent};
use parlor_store::{MessageLog, NewMessage};
use parlor_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::{HubConfig, RoomError};

/// Channel sender for delivering outbound events to one connection.
///
/// Bounded: a slow client fills its own queue and starts losing
/// events, instead of stalling the room for everyone else.
pub type OutboundSender = mpsc::Sender<ServerEvent>;

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in some variants is a reply channel — the
/// caller sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    /// Subscribe a connection to this room's events.
    Join {
        conn: ConnectionId,
        username: String,
        sender: OutboundSender,
        reply: oneshot::Sender<()>,
    },

    /// Unsubscribe a connection.
    Leave {
        conn: ConnectionId,
        username: String,
        reply: oneshot::Sender<()>,
    },

    /// Append a chat message and fan it out to all members.
    Broadcast {
        username: String,
        display_name: String,
        text: String,
        reply: oneshot::Sender<Result<Message, RoomError>>,
    },

    /// Snapshot the current member set.
    Members {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },

    /// Remove a connection without announcement (it's gone).
    Drop { conn: ConnectionId },
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone — it's just an `mpsc::Sender` wrapper. The
/// [`RoomHub`](crate::RoomHub) holds one of these per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's code.
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    /// Subscribes a connection to this room.
    ///
    /// Idempotent: re-joining refreshes the connection's outbound
    /// sender without re-announcing.
    pub async fn join(
        &self,
        conn: ConnectionId,
        username: impl Into<String>,
        sender: OutboundSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                conn,
                username: username.into(),
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Unsubscribes a connection from this room.
    ///
    /// Idempotent: leaving a room you're not in is a quiet no-op.
    pub async fn leave(
        &self,
        conn: ConnectionId,
        username: impl Into<String>,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                conn,
                username: username.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Appends a message to the log and fans it out to all members.
    ///
    /// Returns the stored message (with its log-assigned id). If the
    /// append fails after retries, nothing is delivered.
    pub async fn broadcast(
        &self,
        username: impl Into<String>,
        display_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Message, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Broadcast {
                username: username.into(),
                display_name: display_name.into(),
                text: text.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?
    }

    /// Snapshots the current member set.
    pub async fn members(&self) -> Result<Vec<ConnectionId>, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Members { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Removes a connection without announcement (fire-and-forget).
    pub async fn drop_connection(&self, conn: ConnectionId) {
        let _ = self.sender.send(RoomCommand::Drop { conn }).await;
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_code: RoomCode,
    display_name: String,
    members: HashMap<ConnectionId, OutboundSender>,
    log: Arc<dyn MessageLog>,
    config: HubConfig,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until all handles are
    /// dropped.
    async fn run(mut self) {
        tracing::info!(room = %self.room_code, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    conn,
                    username,
                    sender,
                    reply,
                } => {
                    self.handle_join(conn, &username, sender);
                    let _ = reply.send(());
                }
                RoomCommand::Leave {
                    conn,
                    username,
                    reply,
                } => {
                    self.handle_leave(conn, &username);
                    let _ = reply.send(());
                }
                RoomCommand::Broadcast {
                    username,
                    display_name,
                    text,
                    reply,
                } => {
                    let result = self
                        .handle_broadcast(username, display_name, text)
                        .await;
                    let _ = reply.send(result);
                }
                RoomCommand::Members { reply } => {
                    let _ =
                        reply.send(self.members.keys().copied().collect());
                }
                RoomCommand::Drop { conn } => {
                    if self.members.remove(&conn).is_some() {
                        tracing::debug!(
                            room = %self.room_code,
                            %conn,
                            "connection dropped from room"
                        );
                    }
                }
            }
        }

        tracing::info!(room = %self.room_code, "room actor stopped");
    }

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        username: &str,
        sender: OutboundSender,
    ) {
        let already_member = self.members.contains_key(&conn);
        self.members.insert(conn, sender);

        if already_member {
            // Re-join: the sender is refreshed, nothing is announced.
            tracing::debug!(
                room = %self.room_code,
                %conn,
                "re-join, sender refreshed"
            );
            return;
        }

        tracing::info!(
            room = %self.room_code,
            %conn,
            username,
            members = self.members.len(),
            "joined room"
        );

        // Everyone in the room, the joiner included, sees the greeting.
        let greeting =
            format!("{} joined room: {}", username, self.display_name);
        self.fan_out(ServerEvent::Joined {
            room_code: self.room_code.clone(),
            greeting,
        });
    }

    fn handle_leave(&mut self, conn: ConnectionId, username: &str) {
        if self.members.remove(&conn).is_none() {
            return;
        }

        tracing::info!(
            room = %self.room_code,
            %conn,
            username,
            members = self.members.len(),
            "left room"
        );

        self.fan_out(ServerEvent::Left {
            room_code: self.room_code.clone(),
            username: username.to_string(),
        });
    }

    async fn handle_broadcast(
        &mut self,
        username: String,
        display_name: String,
        text: String,
    ) -> Result<Message, RoomError> {
        let draft = NewMessage {
            created_at: now_millis(),
            room_code: self.room_code.clone(),
            username,
            display_name,
            text,
        };

        // Durable before visible: the append must land before anyone
        // sees the message.
        let stored = self.append_with_retry(draft).await?;

        self.fan_out(ServerEvent::Message {
            message: stored.clone(),
        });
        Ok(stored)
    }

    /// Appends to the log, retrying transient failures with a linear
    /// backoff. After the last attempt the error propagates and the
    /// message is never delivered.
    async fn append_with_retry(
        &self,
        draft: NewMessage,
    ) -> Result<Message, RoomError> {
        let attempts = self.config.append_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.log.append(draft.clone()).await {
                Ok(stored) => return Ok(stored),
                Err(e) => {
                    tracing::warn!(
                        room = %self.room_code,
                        attempt,
                        error = %e,
                        "message log append failed"
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(
                            self.config.append_backoff * attempt,
                        )
                        .await;
                    }
                }
            }
        }
        Err(RoomError::Storage(last_err.expect("at least one attempt")))
    }

    /// Delivers an event to every member's outbound queue.
    ///
    /// `try_send` keeps the room responsive: a full or closed queue
    /// loses this event for that one member only.
    fn fan_out(&self, event: ServerEvent) {
        for (conn, sender) in &self.members {
            if let Err(e) = sender.try_send(event.clone()) {
                tracing::warn!(
                    room = %self.room_code,
                    %conn,
                    error = %e,
                    "outbound queue rejected event, dropping"
                );
            }
        }
    }
}

/// Spawns a new room actor task and returns a handle to it.
pub(crate) fn spawn_room(
    room_code: RoomCode,
    display_name: String,
    log: Arc<dyn MessageLog>,
    config: HubConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_capacity);

    let actor = RoomActor {
        room_code: room_code.clone(),
        display_name,
        members: HashMap::new(),
        log,
        config,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_code,
        sender: tx,
    }
}
