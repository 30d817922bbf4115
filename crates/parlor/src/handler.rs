//! Per-connection handler: login gate, event dispatch, and outbound
//! writer.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler, plus a writer task that drains the connection's bounded
//! outbound queue. The flow is:
//!   1. Receive Login → authenticate → bind session → send LoginOk
//!   2. Loop: receive envelopes → dispatch client events
//!   3. On exit (clean or not), a drop guard invalidates the session
//!      and removes the connection from every room.

use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{
    now_millis, ClientEvent, Codec, Envelope, Payload, ProtocolError,
    ServerEvent,
};
use parlor_room::{BroadcastOutcome, JoinOutcome, RoomError};
use parlor_session::{
    authenticate, update_password, Fingerprint, Session, SessionError,
};
use parlor_store::history_limit;
use parlor_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::ParlorError;

/// How long a fresh connection gets to present credentials.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Drop guard that cleans up a connection's session and memberships
/// when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since
/// `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async work.
struct ConnectionGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.sessions.lock().await.invalidate(conn_id);
            state.hub.drop_connection(conn_id).await;
        });
    }
}

/// Whether the event loop keeps going after a dispatched event.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ParlorError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Login gate (direct sends, no writer yet) ---
    let session = perform_login(&conn, &state).await?;
    tracing::info!(
        %conn_id,
        username = %session.identity.username,
        "user authenticated"
    );

    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    // One writer task per connection drains a bounded queue. Room
    // fan-out and direct replies share this single ordered pipe, so
    // a client sees everything in the order the server produced it.
    let (out_tx, out_rx) = mpsc::channel::<ServerEvent>(
        state.hub.config().outbound_capacity,
    );
    let writer = tokio::spawn(run_writer(
        Arc::clone(&conn),
        Arc::clone(&state),
        out_rx,
    ));

    let mut session = Some(session);

    // --- Step 2: Event loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(
                    %conn_id, error = %e, "failed to decode envelope"
                );
                continue;
            }
        };

        let Payload::Client(event) = envelope.payload else {
            tracing::debug!(
                %conn_id,
                "ignoring server-tagged payload from client"
            );
            continue;
        };

        match dispatch(&conn, &state, &mut session, event, &out_tx).await
        {
            Flow::Continue => {}
            Flow::Close => break,
        }
    }

    // --- Step 3: Teardown ---
    // Leave every room first so the actors release their clones of
    // the outbound sender; once ours is dropped too, the writer
    // drains what's queued and ends on its own. The guard still
    // covers the panic path (its cleanup is idempotent).
    state.sessions.lock().await.invalidate(conn_id);
    state.hub.drop_connection(conn_id).await;
    drop(out_tx);
    let _ = writer.await;
    let _ = conn.close().await;
    Ok(())
}

/// Receives and validates the first event, which must be `Login`.
///
/// Replies are sent directly on the connection: at this point no room
/// can be delivering to this client, so there is nothing to order
/// against.
async fn perform_login<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
) -> Result<Session, ParlorError> {
    let data =
        match tokio::time::timeout(LOGIN_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                return Err(ProtocolError::InvalidMessage(
                    "connection closed before login".into(),
                )
                .into());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ProtocolError::InvalidMessage(
                    "login timed out".into(),
                )
                .into());
            }
        };

    let envelope: Envelope = state.codec.decode(&data)?;

    let Payload::Client(ClientEvent::Login {
        username,
        password,
        agent,
    }) = envelope.payload
    else {
        send_direct(
            conn,
            state,
            ServerEvent::Error {
                code: 401,
                message: "login required".into(),
            },
        )
        .await?;
        return Err(ProtocolError::InvalidMessage(
            "first event must be Login".into(),
        )
        .into());
    };

    match bind_session(state, conn, &username, &password, agent).await {
        Ok(session) => {
            send_direct(
                conn,
                state,
                ServerEvent::LoginOk {
                    username: session.identity.username.clone(),
                    display_name: session.identity.display_name.clone(),
                    token: session.token.clone(),
                },
            )
            .await?;
            Ok(session)
        }
        Err(e) => {
            // One generic rejection for every credential failure.
            send_direct(
                conn,
                state,
                ServerEvent::Error {
                    code: 401,
                    message: "invalid username or password".into(),
                },
            )
            .await?;
            Err(e.into())
        }
    }
}

/// Authenticates credentials, binds a fresh session to the
/// connection, and audits the login.
async fn bind_session<C: Codec>(
    state: &ServerState<C>,
    conn: &WebSocketConnection,
    username: &str,
    password: &str,
    agent: Option<String>,
) -> Result<Session, SessionError> {
    let identity =
        authenticate(state.credentials.as_ref(), username, password)
            .await?;
    let fingerprint = Fingerprint {
        addr: conn.peer_addr().to_string(),
        agent,
    };
    let session = Session::new(identity, fingerprint);
    state
        .sessions
        .lock()
        .await
        .bind(conn.id(), session.clone());
    state
        .hub
        .audit(
            &session.identity,
            format!("{} has logged in.", session.identity.username),
        )
        .await;
    Ok(session)
}

/// Re-checks the connection's session and fingerprint before a
/// privileged operation.
async fn require_session<C: Codec>(
    state: &ServerState<C>,
    conn: &WebSocketConnection,
    session: &Option<Session>,
) -> Result<Session, SessionError> {
    let Some(current) = session else {
        return Err(SessionError::Unauthenticated(conn.id()));
    };
    // The peer address is re-derived from the socket; the agent can
    // only be observed at login, so the stored one is carried over.
    let fingerprint = Fingerprint {
        addr: conn.peer_addr().to_string(),
        agent: current.fingerprint.agent.clone(),
    };
    state
        .sessions
        .lock()
        .await
        .verify(conn.id(), &fingerprint)
        .cloned()
}

/// Dispatches one client event. Returns whether to keep the
/// connection open.
async fn dispatch<C: Codec>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<ServerState<C>>,
    session: &mut Option<Session>,
    event: ClientEvent,
    out_tx: &mpsc::Sender<ServerEvent>,
) -> Flow {
    let conn_id = conn.id();

    match event {
        // -- Connection lifecycle ---------------------------------------

        ClientEvent::Login {
            username,
            password,
            agent,
        } => {
            // A re-login replaces the session only if it succeeds;
            // a failed attempt leaves the current session alone.
            match bind_session(state, conn, &username, &password, agent)
                .await
            {
                Ok(new_session) => {
                    // Room memberships belong to the identity that
                    // joined them. A fresh session starts with none.
                    state.hub.drop_connection(conn_id).await;
                    send_event(
                        out_tx,
                        ServerEvent::LoginOk {
                            username: new_session
                                .identity
                                .username
                                .clone(),
                            display_name: new_session
                                .identity
                                .display_name
                                .clone(),
                            token: new_session.token.clone(),
                        },
                    )
                    .await;
                    *session = Some(new_session);
                }
                Err(SessionError::InvalidCredentials) => {
                    send_error(
                        out_tx,
                        401,
                        "invalid username or password",
                    )
                    .await;
                }
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "login failed");
                    send_error(out_tx, 503, "login unavailable").await;
                }
            }
            Flow::Continue
        }

        ClientEvent::Logout => {
            state.sessions.lock().await.invalidate(conn_id);
            state.hub.drop_connection(conn_id).await;
            *session = None;
            Flow::Continue
        }

        ClientEvent::Disconnect { reason } => {
            tracing::info!(%conn_id, %reason, "client disconnected");
            Flow::Close
        }

        // -- Room membership --------------------------------------------

        ClientEvent::Join { room_code } => {
            let current =
                match require_session(state, conn, session).await {
                    Ok(s) => s,
                    Err(e) => {
                        return close_unauthenticated(
                            conn_id, session, out_tx, e,
                        )
                        .await;
                    }
                };
            match state
                .hub
                .join(conn_id, &current.identity, &room_code, out_tx.clone())
                .await
            {
                // A denial is deliberately silent on this connection;
                // it surfaces only in the ADMIN audit trail.
                Ok(JoinOutcome::Joined) | Ok(JoinOutcome::Denied) => {}
                Err(RoomError::UnknownRoom(room)) => {
                    send_error(
                        out_tx,
                        404,
                        &format!("room {room} not found"),
                    )
                    .await;
                }
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "join failed");
                    send_error(out_tx, 503, "room unavailable").await;
                }
            }
            Flow::Continue
        }

        ClientEvent::Leave { room_code } => {
            let current =
                match require_session(state, conn, session).await {
                    Ok(s) => s,
                    Err(e) => {
                        return close_unauthenticated(
                            conn_id, session, out_tx, e,
                        )
                        .await;
                    }
                };
            match state
                .hub
                .leave(conn_id, &current.identity, &room_code)
                .await
            {
                Ok(()) => {}
                Err(RoomError::UnknownRoom(room)) => {
                    send_error(
                        out_tx,
                        404,
                        &format!("room {room} not found"),
                    )
                    .await;
                }
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "leave failed");
                    send_error(out_tx, 503, "room unavailable").await;
                }
            }
            Flow::Continue
        }

        // -- Chat -------------------------------------------------------

        ClientEvent::Broadcast { room_code, text } => {
            let current =
                match require_session(state, conn, session).await {
                    Ok(s) => s,
                    Err(e) => {
                        return close_unauthenticated(
                            conn_id, session, out_tx, e,
                        )
                        .await;
                    }
                };
            match state
                .hub
                .broadcast(&current.identity, &room_code, text)
                .await
            {
                // Delivery comes back through the room's fan-out;
                // denial is silent, as with Join.
                Ok(BroadcastOutcome::Delivered(_))
                | Ok(BroadcastOutcome::Denied) => {}
                Err(RoomError::UnknownRoom(room)) => {
                    send_error(
                        out_tx,
                        404,
                        &format!("room {room} not found"),
                    )
                    .await;
                }
                Err(e) => {
                    tracing::error!(
                        %conn_id, error = %e, "broadcast failed"
                    );
                    send_error(
                        out_tx,
                        503,
                        "message could not be recorded",
                    )
                    .await;
                }
            }
            Flow::Continue
        }

        // -- Queries ----------------------------------------------------

        ClientEvent::History { room_code, limit } => {
            let current =
                match require_session(state, conn, session).await {
                    Ok(s) => s,
                    Err(e) => {
                        return close_unauthenticated(
                            conn_id, session, out_tx, e,
                        )
                        .await;
                    }
                };
            if !state.directory.contains(&room_code) {
                send_error(
                    out_tx,
                    404,
                    &format!("room {room_code} not found"),
                )
                .await;
            } else if !current.identity.can_access(&room_code) {
                // Queries are request/response, so unlike Join the
                // client does learn it was refused.
                send_error(
                    out_tx,
                    403,
                    &format!("access to room {room_code} denied"),
                )
                .await;
            } else {
                let n = history_limit(limit);
                let messages =
                    match state.log.last_n(&room_code, n).await {
                        Ok(messages) => messages,
                        Err(e) => {
                            tracing::error!(
                                %conn_id,
                                error = %e,
                                "history query failed"
                            );
                            Vec::new()
                        }
                    };
                send_event(
                    out_tx,
                    ServerEvent::History {
                        room_code,
                        messages,
                    },
                )
                .await;
            }
            Flow::Continue
        }

        ClientEvent::UserRooms => {
            let current =
                match require_session(state, conn, session).await {
                    Ok(s) => s,
                    Err(e) => {
                        return close_unauthenticated(
                            conn_id, session, out_tx, e,
                        )
                        .await;
                    }
                };
            let rooms = state.directory.entries_for(&current.identity);
            send_event(out_tx, ServerEvent::UserRooms { rooms }).await;
            Flow::Continue
        }

        // -- Account ----------------------------------------------------

        ClientEvent::UpdatePassword {
            old_password,
            new_password,
            confirm_new_password,
        } => {
            let current =
                match require_session(state, conn, session).await {
                    Ok(s) => s,
                    Err(e) => {
                        return close_unauthenticated(
                            conn_id, session, out_tx, e,
                        )
                        .await;
                    }
                };
            match update_password(
                state.credentials.as_ref(),
                &current.identity.username,
                &old_password,
                &new_password,
                &confirm_new_password,
            )
            .await
            {
                Ok(()) => {
                    send_event(out_tx, ServerEvent::PasswordUpdated)
                        .await;
                    state
                        .hub
                        .audit(
                            &current.identity,
                            format!(
                                "{} has updated password.",
                                current.identity.username
                            ),
                        )
                        .await;
                }
                Err(SessionError::InvalidCredentials) => {
                    send_error(
                        out_tx,
                        401,
                        "invalid username or password",
                    )
                    .await;
                }
                Err(SessionError::Password(e)) => {
                    send_error(out_tx, 400, &e.to_string()).await;
                }
                Err(e) => {
                    tracing::error!(
                        %conn_id, error = %e, "password update failed"
                    );
                    send_error(
                        out_tx,
                        503,
                        "credential store unavailable",
                    )
                    .await;
                }
            }
            Flow::Continue
        }
    }
}

/// Rejects an unauthenticated (or fingerprint-failed) request and
/// closes the connection.
async fn close_unauthenticated(
    conn_id: ConnectionId,
    session: &mut Option<Session>,
    out_tx: &mpsc::Sender<ServerEvent>,
    error: SessionError,
) -> Flow {
    tracing::warn!(%conn_id, error = %error, "rejecting request");
    *session = None;
    send_error(out_tx, 401, "authentication required").await;
    Flow::Close
}

/// The writer task: drains the outbound queue into envelopes on the
/// wire. Ends when the queue closes or the connection breaks.
async fn run_writer<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut out_rx: mpsc::Receiver<ServerEvent>,
) {
    let mut seq: u64 = 1;
    while let Some(event) = out_rx.recv().await {
        let envelope = Envelope {
            seq,
            timestamp: now_millis(),
            payload: Payload::Server(event),
        };
        seq += 1;
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(
                    conn_id = %conn.id(),
                    error = %e,
                    "failed to encode outbound envelope"
                );
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(
                conn_id = %conn.id(),
                error = %e,
                "writer send failed"
            );
            break;
        }
    }
}

/// Queues a server event for the writer task.
async fn send_event(
    out_tx: &mpsc::Sender<ServerEvent>,
    event: ServerEvent,
) {
    if out_tx.send(event).await.is_err() {
        tracing::debug!("outbound queue closed, event dropped");
    }
}

/// Queues an error event for the writer task.
async fn send_error(
    out_tx: &mpsc::Sender<ServerEvent>,
    code: u16,
    message: &str,
) {
    send_event(
        out_tx,
        ServerEvent::Error {
            code,
            message: message.to_string(),
        },
    )
    .await;
}

/// Sends one envelope directly on the connection, bypassing the
/// writer. Only used during the login gate.
async fn send_direct<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    event: ServerEvent,
) -> Result<(), ParlorError> {
    let envelope = Envelope {
        seq: 0,
        timestamp: now_millis(),
        payload: Payload::Server(event),
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(ParlorError::Transport)?;
    Ok(())
}
