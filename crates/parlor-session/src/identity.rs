//! Identity and session types: who a user is, and the server's record
//! of their live connection.

use parlor_protocol::RoomCode;
use rand::Rng;

use crate::credentials::hash_password;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An authenticated user as stored in the credential store.
///
/// `authorized_rooms` is the user's room allow list, kept in the order
/// it was configured — that order is what the `UserRooms` query
/// surfaces back to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Login name, unique across the store.
    pub username: String,

    /// Hex-encoded SHA-256 digest of the password. The plain password
    /// never leaves the login and password-update paths.
    pub password_hash: String,

    /// Human-facing name shown next to messages.
    pub display_name: String,

    /// The rooms this user may join and broadcast to, in configured
    /// order. No room grants implicit access to any other, including
    /// the administrative room.
    pub authorized_rooms: Vec<RoomCode>,
}

impl Identity {
    /// Creates an identity from a plain password, hashing it on the
    /// way in.
    pub fn new(
        username: impl Into<String>,
        password: &str,
        display_name: impl Into<String>,
        authorized_rooms: Vec<RoomCode>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: hash_password(password),
            display_name: display_name.into(),
            authorized_rooms,
        }
    }

    /// Whether this user may join or broadcast to the given room.
    ///
    /// A pure allow-list test. Authorization for the administrative
    /// room is granted like any other: by listing it.
    pub fn can_access(&self, room: &RoomCode) -> bool {
        self.authorized_rooms.contains(room)
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// What the server observed about a connection at login time.
///
/// Under strict session protection, later requests on the same
/// connection must still match this snapshot. A mismatch means the
/// session was hijacked or the connection was tampered with, and the
/// session is invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Remote peer address, as a string.
    pub addr: String,

    /// Client's self-reported user agent, if it sent one.
    pub agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single user's session on the server.
///
/// Created after a successful login, bound to one connection in the
/// [`SessionRegistry`](crate::SessionRegistry). Lives until logout,
/// disconnect, or a strict-mode fingerprint mismatch.
#[derive(Debug, Clone)]
pub struct Session {
    /// Who this session belongs to.
    pub identity: Identity,

    /// The connection's observed fingerprint at login.
    pub fingerprint: Fingerprint,

    /// Opaque acknowledgment token issued at login, echoed to the
    /// client in `LoginOk`. 32 hex characters, 128 bits of randomness.
    pub token: String,
}

impl Session {
    /// Creates a session for an authenticated identity, generating a
    /// fresh token.
    pub fn new(identity: Identity, fingerprint: Fingerprint) -> Self {
        Self {
            identity,
            fingerprint,
            token: generate_token(),
        }
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
