//! Core protocol types for Parlor's wire format.
//!
//! This module defines every type that travels "on the wire" — the
//! structures that get serialized to bytes, sent over the network, and
//! deserialized on the other side.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A room's short code, e.g. `"LOBBY"` or `"ADMIN"`.
///
/// This is a newtype wrapper around `String`: you can't accidentally
/// pass a username where a room code is expected, and function
/// signatures like `fn join(room: &RoomCode)` read clearly.
///
/// `#[serde(transparent)]` makes a `RoomCode("LOBBY")` serialize as just
/// `"LOBBY"` in JSON, not as a wrapper object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

/// The code of the administrative room that receives the audit trail.
const ADMIN_ROOM_CODE: &str = "ADMIN";

impl RoomCode {
    /// Creates a room code from anything string-like.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The administrative room. Every deployment has it: login, join,
    /// denial, and password-change audit messages land here.
    pub fn admin() -> Self {
        Self(ADMIN_ROOM_CODE.to_string())
    }

    /// Whether this code names the administrative room.
    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_ROOM_CODE
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (code, display name) pair returned in room listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntry {
    /// The room's short code.
    pub room_code: RoomCode,
    /// The human-facing name shown in clients.
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Message — one logged chat entry
// ---------------------------------------------------------------------------

/// A single chat message as recorded in the message log.
///
/// Messages are immutable once appended: `id` is assigned by the log
/// (strictly increasing per append), `created_at` is server wall-clock
/// milliseconds since the Unix epoch, and `text` is relayed verbatim —
/// the server never rewrites or sanitizes content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Log-assigned identifier, unique across all rooms.
    pub id: u64,
    /// Server timestamp in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// The room this message belongs to.
    pub room_code: RoomCode,
    /// Sender's login name.
    pub username: String,
    /// Sender's display name at the time of sending.
    pub display_name: String,
    /// The message body, verbatim.
    pub text: String,
}

// ---------------------------------------------------------------------------
// ClientEvent — what clients send
// ---------------------------------------------------------------------------

/// Events sent by a client to the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON. Instead of
/// `{ "Login": { ... } }` it produces `{ "type": "Login", ... }`, which
/// is much easier to work with in JavaScript clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    // -- Connection lifecycle --

    /// "Here are my credentials." Must be the first event on a fresh
    /// connection; anything else is rejected with a 401 and the
    /// connection is closed. `agent` is the client's self-reported
    /// user agent, folded into the session fingerprint.
    Login {
        username: String,
        password: String,
        agent: Option<String>,
    },

    /// "Forget my session but keep the connection."
    /// A subsequent `Login` may re-authenticate.
    Logout,

    /// "I'm going away." Includes a human-readable reason for logging.
    Disconnect { reason: String },

    // -- Room membership --

    /// "Subscribe me to this room's live messages."
    Join { room_code: RoomCode },

    /// "Stop delivering this room's messages to me."
    Leave { room_code: RoomCode },

    // -- Chat --

    /// "Relay this text to everyone in the room."
    Broadcast { room_code: RoomCode, text: String },

    // -- Queries --

    /// "Show me the most recent messages in this room."
    /// `limit` defaults to 20 when absent or zero.
    History {
        room_code: RoomCode,
        limit: Option<u32>,
    },

    /// "Which rooms am I allowed into?"
    UserRooms,

    // -- Account --

    /// "Change my password." The old password is re-checked, the new
    /// one must be at least 8 characters after trimming, differ from
    /// the old, and match the confirmation.
    UpdatePassword {
        old_password: String,
        new_password: String,
        confirm_new_password: String,
    },
}

// ---------------------------------------------------------------------------
// ServerEvent — what the server sends
// ---------------------------------------------------------------------------

/// Events sent by the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// "You're in." Sent once per successful login. `token` is an
    /// opaque session acknowledgment the client can log or echo for
    /// support purposes.
    LoginOk {
        username: String,
        display_name: String,
        token: String,
    },

    /// "Someone (possibly you) joined a room you're in."
    /// `greeting` is the human-readable announcement, e.g.
    /// "alice joined room: Lobby".
    Joined {
        room_code: RoomCode,
        greeting: String,
    },

    /// "Someone left a room you're in."
    Left {
        room_code: RoomCode,
        username: String,
    },

    /// "A new chat message in one of your rooms."
    Message { message: Message },

    /// Reply to a `History` query, oldest first.
    History {
        room_code: RoomCode,
        messages: Vec<Message>,
    },

    /// Reply to a `UserRooms` query, in the user's configured order.
    UserRooms { rooms: Vec<RoomEntry> },

    /// "Your password was changed."
    PasswordUpdated,

    /// "Something went wrong."
    /// `code` follows HTTP-style conventions (400 = bad request,
    /// 401 = unauthorized, 403 = forbidden, 404 = not found,
    /// 503 = temporarily unavailable).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload — what's inside an envelope
// ---------------------------------------------------------------------------

/// The content of a message: a client event or a server event.
///
/// `#[serde(tag = "type", content = "data")]` produces "adjacently
/// tagged" JSON:
///   `{ "type": "Client", "data": { "type": "Logout" } }`
///
/// The outer tag lets either side check direction before looking at
/// the event itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// An event originated by a client.
    Client(ClientEvent),

    /// An event originated by the server.
    Server(ServerEvent),
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every message on the wire is an
/// Envelope: metadata on the outside (sequence number, timestamp) and
/// the actual content (payload) inside.
///
/// ```text
/// ┌───────────────────────────────────┐
/// │ seq: 42                           │  ← message ordering
/// │ timestamp: 1700000000000          │  ← when it was sent
/// │ ┌───────────────────────────────┐ │
/// │ │ payload: Client(Login { .. }) │ │  ← the actual content
/// │ └───────────────────────────────┘ │
/// └───────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Auto-incrementing sequence number. Each side (client and
    /// server) maintains its own counter per connection.
    pub seq: u64,

    /// Milliseconds since the Unix epoch at send time.
    pub timestamp: u64,

    /// The actual message content.
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
