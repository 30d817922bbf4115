//! Credential storage and password verification.
//!
//! Parlor doesn't dictate where user records live — that's the
//! deployment's job (a database, an LDAP proxy, a config file).
//! The [`CredentialStore`] trait defines WHAT the session layer needs:
//! find a user by name, persist a new password hash. The framework
//! ships [`MemoryCredentialStore`] for development and tests.
//!
//! The trait is `#[async_trait]` so backends can be held as
//! `Arc<dyn CredentialStore>` and still do real I/O.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::{Identity, SessionError};

/// Hex-encoded SHA-256 digest of a password.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Whether `password` matches the stored `hash`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}

/// Looks up users and persists password changes.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Finds a user record by login name.
    ///
    /// `Ok(None)` means "no such user" — only infrastructure failures
    /// are errors.
    async fn find(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, SessionError>;

    /// Replaces the stored password hash for an existing user.
    async fn set_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), SessionError>;
}

/// Verifies credentials against a store.
///
/// Unknown usernames and wrong passwords both yield
/// [`SessionError::InvalidCredentials`] with identical shape and
/// message, so the response never confirms whether a username exists.
pub async fn authenticate(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<Identity, SessionError> {
    let Some(identity) = store.find(username).await? else {
        return Err(SessionError::InvalidCredentials);
    };
    if !verify_password(password, &identity.password_hash) {
        return Err(SessionError::InvalidCredentials);
    }
    Ok(identity)
}

// ---------------------------------------------------------------------------
// MemoryCredentialStore
// ---------------------------------------------------------------------------

/// An in-memory [`CredentialStore`] for development and tests.
///
/// Seeded up front; user records live in a `RwLock<HashMap>` because
/// reads (logins) vastly outnumber writes (password updates).
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, Identity>>,
}

impl MemoryCredentialStore {
    /// Creates a store seeded with the given identities.
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
        let users = identities
            .into_iter()
            .map(|id| (id.username.clone(), id))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, SessionError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn set_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), SessionError> {
        let mut users = self.users.write().await;
        let Some(identity) = users.get_mut(username) else {
            return Err(SessionError::InvalidCredentials);
        };
        identity.password_hash = password_hash.to_string();
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
