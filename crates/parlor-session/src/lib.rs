//! User session management for Parlor.
//!
//! This crate handles who a connection belongs to:
//!
//! 1. **Credentials** — looking up users and verifying passwords
//!    ([`CredentialStore`] trait, [`MemoryCredentialStore`])
//! 2. **Sessions** — binding an authenticated [`Identity`] to a live
//!    connection, with a fingerprint check against session hijacking
//!    ([`SessionRegistry`])
//! 3. **Access control** — the per-room allow list carried on each
//!    identity ([`Identity::can_access`])
//! 4. **Password updates** — validated, audited password changes
//!    ([`update_password`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← consults access control on join/broadcast
//!     ↕
//! Session Layer (this crate)  ← maps ConnectionId → authenticated user
//!     ↕
//! Protocol Layer (below)  ← provides RoomCode and wire events
//! ```

mod credentials;
mod error;
mod identity;
mod password;
mod registry;

pub use credentials::{
    authenticate, hash_password, verify_password, CredentialStore,
    MemoryCredentialStore,
};
pub use error::{PasswordError, SessionError};
pub use identity::{Fingerprint, Identity, Session};
pub use password::{update_password, MIN_PASSWORD_LEN};
pub use registry::{SessionProtection, SessionRegistry};
