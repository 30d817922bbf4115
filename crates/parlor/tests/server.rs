//! Integration tests for the Parlor server, handler, and full
//! connection flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parlor::prelude::*;
use tokio_tungstenite::tungstenite::Message as WsMessage;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port with a fixed user/room roster and
/// returns the address.
///
/// - alice  → Lobby + Admin
/// - carol  → Lobby
/// - bob    → The Den only
async fn start_server() -> String {
    let credentials = Arc::new(MemoryCredentialStore::new([
        Identity::new(
            "alice",
            "wonderland",
            "Alice",
            vec![RoomCode::new("LOBBY"), RoomCode::admin()],
        ),
        Identity::new(
            "carol",
            "caroltide",
            "Carol",
            vec![RoomCode::new("LOBBY")],
        ),
        Identity::new(
            "bob",
            "builderpw",
            "Bob",
            vec![RoomCode::new("DEN")],
        ),
    ]));
    let log = Arc::new(MemoryMessageLog::new());

    let server = ParlorServer::builder()
        .bind("127.0.0.1:0")
        .room(RoomCode::new("LOBBY"), "Lobby")
        .room(RoomCode::new("DEN"), "The Den")
        .build(credentials, log)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_event(ws: &mut ClientWs, event: ClientEvent) {
    let envelope = Envelope {
        seq: 1,
        timestamp: 0,
        payload: Payload::Client(event),
    };
    let bytes = serde_json::to_vec(&envelope).expect("encode");
    ws.send(WsMessage::Binary(bytes.into()))
        .await
        .expect("send");
}

/// Waits up to five seconds for the next server event.
async fn recv_event(ws: &mut ClientWs) -> ServerEvent {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for server event")
        .expect("stream ended")
        .expect("websocket error");
    let envelope: Envelope =
        serde_json::from_slice(&msg.into_data()).expect("decode");
    match envelope.payload {
        Payload::Server(event) => event,
        other => panic!("expected server payload, got {other:?}"),
    }
}

/// Logs in and returns the server's reply (LoginOk or Error).
async fn login(
    ws: &mut ClientWs,
    username: &str,
    password: &str,
) -> ServerEvent {
    send_event(
        ws,
        ClientEvent::Login {
            username: username.into(),
            password: password.into(),
            agent: Some("test-client".into()),
        },
    )
    .await;
    recv_event(ws).await
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_success() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    match login(&mut ws, "alice", "wonderland").await {
        ServerEvent::LoginOk {
            username,
            display_name,
            token,
        } => {
            assert_eq!(username, "alice");
            assert_eq!(display_name, "Alice");
            assert_eq!(token.len(), 32);
        }
        other => panic!("expected LoginOk, got {other:?}"),
    }
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_user_look_identical() {
    let addr = start_server().await;

    let mut ws1 = connect(&addr).await;
    let wrong_password = login(&mut ws1, "alice", "not-her-password").await;

    let mut ws2 = connect(&addr).await;
    let unknown_user = login(&mut ws2, "mallory", "whatever").await;

    // A probing client must not be able to tell the two cases apart.
    match (&wrong_password, &unknown_user) {
        (
            ServerEvent::Error {
                code: c1,
                message: m1,
            },
            ServerEvent::Error {
                code: c2,
                message: m2,
            },
        ) => {
            assert_eq!(*c1, 401);
            assert_eq!(*c2, 401);
            assert_eq!(m1, m2);
        }
        other => panic!("expected two Errors, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_event_must_be_login() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(&mut ws, ClientEvent::UserRooms).await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 401),
        other => panic!("expected Error 401, got {other:?}"),
    }

    // The server should then close the connection.
    let result =
        tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) => {}
        Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

// =========================================================================
// Join / broadcast / fan-out
// =========================================================================

#[tokio::test]
async fn test_join_then_broadcast_flow() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    send_event(
        &mut ws,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    match recv_event(&mut ws).await {
        ServerEvent::Joined {
            room_code,
            greeting,
        } => {
            assert_eq!(room_code, RoomCode::new("LOBBY"));
            assert_eq!(greeting, "alice joined room: Lobby");
        }
        other => panic!("expected Joined, got {other:?}"),
    }

    send_event(
        &mut ws,
        ClientEvent::Broadcast {
            room_code: RoomCode::new("LOBBY"),
            text: "hello, room".into(),
        },
    )
    .await;
    match recv_event(&mut ws).await {
        ServerEvent::Message { message } => {
            assert_eq!(message.room_code, RoomCode::new("LOBBY"));
            assert_eq!(message.username, "alice");
            assert_eq!(message.display_name, "Alice");
            assert_eq!(message.text, "hello, room");
            assert!(message.id >= 1);
            assert!(message.created_at > 0);
        }
        other => panic!("expected Message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_broadcast_reaches_every_member() {
    let addr = start_server().await;

    let mut alice = connect(&addr).await;
    login(&mut alice, "alice", "wonderland").await;
    send_event(
        &mut alice,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut alice).await; // alice's own greeting

    let mut carol = connect(&addr).await;
    login(&mut carol, "carol", "caroltide").await;
    send_event(
        &mut carol,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut carol).await; // carol's greeting
    recv_event(&mut alice).await; // alice sees carol join too

    send_event(
        &mut alice,
        ClientEvent::Broadcast {
            room_code: RoomCode::new("LOBBY"),
            text: "hi carol".into(),
        },
    )
    .await;

    for ws in [&mut alice, &mut carol] {
        match recv_event(ws).await {
            ServerEvent::Message { message } => {
                assert_eq!(message.username, "alice");
                assert_eq!(message.text, "hi carol");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_leave_announced_to_remaining_members() {
    let addr = start_server().await;

    let mut alice = connect(&addr).await;
    login(&mut alice, "alice", "wonderland").await;
    send_event(
        &mut alice,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut alice).await;

    let mut carol = connect(&addr).await;
    login(&mut carol, "carol", "caroltide").await;
    send_event(
        &mut carol,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut carol).await;
    recv_event(&mut alice).await;

    send_event(
        &mut carol,
        ClientEvent::Leave {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;

    match recv_event(&mut alice).await {
        ServerEvent::Left {
            room_code,
            username,
        } => {
            assert_eq!(room_code, RoomCode::new("LOBBY"));
            assert_eq!(username, "carol");
        }
        other => panic!("expected Left, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_unknown_room_not_found() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    send_event(
        &mut ws,
        ClientEvent::Join {
            room_code: RoomCode::new("VOID"),
        },
    )
    .await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected Error 404, got {other:?}"),
    }
}

// =========================================================================
// Access control and the audit trail
// =========================================================================

#[tokio::test]
async fn test_join_denied_silently_and_audited() {
    let addr = start_server().await;

    // alice watches the ADMIN room.
    let mut alice = connect(&addr).await;
    login(&mut alice, "alice", "wonderland").await;
    send_event(
        &mut alice,
        ClientEvent::Join {
            room_code: RoomCode::admin(),
        },
    )
    .await;
    match recv_event(&mut alice).await {
        ServerEvent::Joined { room_code, .. } => {
            assert_eq!(room_code, RoomCode::admin());
        }
        other => panic!("expected Joined, got {other:?}"),
    }

    // bob logs in (audited) and tries a room he has no access to.
    let mut bob = connect(&addr).await;
    login(&mut bob, "bob", "builderpw").await;
    send_event(
        &mut bob,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;

    // bob gets no reply at all; his next request is answered as if
    // the denied join never happened.
    send_event(&mut bob, ClientEvent::UserRooms).await;
    match recv_event(&mut bob).await {
        ServerEvent::UserRooms { rooms } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].room_code, RoomCode::new("DEN"));
        }
        other => panic!("expected UserRooms, got {other:?}"),
    }

    // alice sees both audit entries in the ADMIN room.
    match recv_event(&mut alice).await {
        ServerEvent::Message { message } => {
            assert_eq!(message.username, "bob");
            assert_eq!(message.text, "bob has logged in.");
        }
        other => panic!("expected login audit, got {other:?}"),
    }
    match recv_event(&mut alice).await {
        ServerEvent::Message { message } => {
            assert_eq!(message.username, "bob");
            assert_eq!(
                message.text,
                "bob attempted to join room but denied: Lobby"
            );
        }
        other => panic!("expected denial audit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_history_denied_room_forbidden() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "bob", "builderpw").await;

    send_event(
        &mut ws,
        ClientEvent::History {
            room_code: RoomCode::new("LOBBY"),
            limit: None,
        },
    )
    .await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 403),
        other => panic!("expected Error 403, got {other:?}"),
    }
}

// =========================================================================
// History
// =========================================================================

#[tokio::test]
async fn test_history_returns_recent_messages_in_order() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    send_event(
        &mut ws,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut ws).await;

    for text in ["one", "two", "three"] {
        send_event(
            &mut ws,
            ClientEvent::Broadcast {
                room_code: RoomCode::new("LOBBY"),
                text: text.into(),
            },
        )
        .await;
        recv_event(&mut ws).await; // own fan-out copy
    }

    send_event(
        &mut ws,
        ClientEvent::History {
            room_code: RoomCode::new("LOBBY"),
            limit: Some(2),
        },
    )
    .await;

    match recv_event(&mut ws).await {
        ServerEvent::History {
            room_code,
            messages,
        } => {
            assert_eq!(room_code, RoomCode::new("LOBBY"));
            let texts: Vec<&str> =
                messages.iter().map(|m| m.text.as_str()).collect();
            assert_eq!(texts, vec!["two", "three"]);
        }
        other => panic!("expected History, got {other:?}"),
    }
}

#[tokio::test]
async fn test_history_unknown_room_not_found() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    send_event(
        &mut ws,
        ClientEvent::History {
            room_code: RoomCode::new("VOID"),
            limit: None,
        },
    )
    .await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected Error 404, got {other:?}"),
    }
}

// =========================================================================
// Room listing
// =========================================================================

#[tokio::test]
async fn test_user_rooms_follows_identity_order() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    send_event(&mut ws, ClientEvent::UserRooms).await;

    match recv_event(&mut ws).await {
        ServerEvent::UserRooms { rooms } => {
            assert_eq!(rooms.len(), 2);
            assert_eq!(rooms[0].room_code, RoomCode::new("LOBBY"));
            assert_eq!(rooms[0].display_name, "Lobby");
            assert_eq!(rooms[1].room_code, RoomCode::admin());
            assert_eq!(rooms[1].display_name, "Admin");
        }
        other => panic!("expected UserRooms, got {other:?}"),
    }
}

// =========================================================================
// Password updates
// =========================================================================

#[tokio::test]
async fn test_update_password_success_and_relogin() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "carol", "caroltide").await;

    send_event(
        &mut ws,
        ClientEvent::UpdatePassword {
            old_password: "caroltide".into(),
            new_password: "tidal-wave-9".into(),
            confirm_new_password: "tidal-wave-9".into(),
        },
    )
    .await;
    match recv_event(&mut ws).await {
        ServerEvent::PasswordUpdated => {}
        other => panic!("expected PasswordUpdated, got {other:?}"),
    }

    // The old password no longer works; the new one does.
    let mut old = connect(&addr).await;
    match login(&mut old, "carol", "caroltide").await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 401),
        other => panic!("expected Error 401, got {other:?}"),
    }
    let mut new = connect(&addr).await;
    match login(&mut new, "carol", "tidal-wave-9").await {
        ServerEvent::LoginOk { username, .. } => {
            assert_eq!(username, "carol");
        }
        other => panic!("expected LoginOk, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_password_too_short_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "carol", "caroltide").await;

    send_event(
        &mut ws,
        ClientEvent::UpdatePassword {
            old_password: "caroltide".into(),
            new_password: "short".into(),
            confirm_new_password: "short".into(),
        },
    )
    .await;
    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error 400, got {other:?}"),
    }

    // The old password is untouched by the failed attempt.
    let mut again = connect(&addr).await;
    match login(&mut again, "carol", "caroltide").await {
        ServerEvent::LoginOk { .. } => {}
        other => panic!("expected LoginOk, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_password_wrong_old_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "carol", "caroltide").await;

    send_event(
        &mut ws,
        ClientEvent::UpdatePassword {
            old_password: "not-it".into(),
            new_password: "tidal-wave-9".into(),
            confirm_new_password: "tidal-wave-9".into(),
        },
    )
    .await;
    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 401),
        other => panic!("expected Error 401, got {other:?}"),
    }
}

// =========================================================================
// Session lifecycle
// =========================================================================

#[tokio::test]
async fn test_relogin_clears_previous_memberships() {
    let addr = start_server().await;

    // alice joins LOBBY, then the same socket re-logs-in as bob, who
    // has no LOBBY access.
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;
    send_event(
        &mut ws,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut ws).await; // alice's greeting

    match login(&mut ws, "bob", "builderpw").await {
        ServerEvent::LoginOk { username, .. } => {
            assert_eq!(username, "bob");
        }
        other => panic!("expected LoginOk, got {other:?}"),
    }

    // carol's join fans out to every LOBBY member; the re-logged-in
    // socket must not be one of them anymore.
    let mut carol = connect(&addr).await;
    login(&mut carol, "carol", "caroltide").await;
    send_event(
        &mut carol,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut carol).await;

    // The next event on bob's socket is his own query reply, not
    // carol's Joined announcement.
    send_event(&mut ws, ClientEvent::UserRooms).await;
    match recv_event(&mut ws).await {
        ServerEvent::UserRooms { rooms } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].room_code, RoomCode::new("DEN"));
        }
        other => panic!("expected UserRooms, got {other:?}"),
    }
}

#[tokio::test]
async fn test_logout_then_join_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    send_event(&mut ws, ClientEvent::Logout).await;
    send_event(
        &mut ws,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;

    // The rejection must arrive before the server closes — it goes
    // through the writer queue, which is drained on teardown.
    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 401),
        other => panic!("expected Error 401, got {other:?}"),
    }
    let result =
        tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) => {}
        Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_closes_connection() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    send_event(
        &mut ws,
        ClientEvent::Disconnect {
            reason: "bye".into(),
        },
    )
    .await;

    let result =
        tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) => {}
        Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_removes_member_from_rooms() {
    let addr = start_server().await;

    let mut alice = connect(&addr).await;
    login(&mut alice, "alice", "wonderland").await;
    send_event(
        &mut alice,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut alice).await;

    let mut carol = connect(&addr).await;
    login(&mut carol, "carol", "caroltide").await;
    send_event(
        &mut carol,
        ClientEvent::Join {
            room_code: RoomCode::new("LOBBY"),
        },
    )
    .await;
    recv_event(&mut carol).await;
    recv_event(&mut alice).await;

    // carol vanishes without a Leave.
    drop(carol);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // alice can still broadcast; the room is not stalled by the dead
    // member, and no Left announcement was made for carol.
    send_event(
        &mut alice,
        ClientEvent::Broadcast {
            room_code: RoomCode::new("LOBBY"),
            text: "still here".into(),
        },
    )
    .await;
    match recv_event(&mut alice).await {
        ServerEvent::Message { message } => {
            assert_eq!(message.text, "still here");
        }
        other => panic!("expected Message, got {other:?}"),
    }
}

// =========================================================================
// Protocol robustness
// =========================================================================

#[tokio::test]
async fn test_invalid_envelope_ignored() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    login(&mut ws, "alice", "wonderland").await;

    ws.send(WsMessage::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");

    // A valid request afterwards still works.
    send_event(&mut ws, ClientEvent::UserRooms).await;
    match recv_event(&mut ws).await {
        ServerEvent::UserRooms { rooms } => assert_eq!(rooms.len(), 2),
        other => panic!("expected UserRooms, got {other:?}"),
    }
}
