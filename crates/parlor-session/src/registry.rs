//! The session registry: tracks which connection belongs to which
//! authenticated user.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself — it uses a plain
//! `HashMap`, not a concurrent one. This is intentional: the registry
//! is owned by the server and accessed through a mutex at a higher
//! level. Keeping it simple here avoids hidden locking overhead.

use std::collections::HashMap;

use parlor_transport::ConnectionId;

use crate::{Fingerprint, Session, SessionError};

/// How strictly the registry ties a session to the connection
/// characteristics observed at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionProtection {
    /// Every verified request must match the login fingerprint
    /// (peer address and user agent). A mismatch invalidates the
    /// session immediately. The default.
    #[default]
    Strict,

    /// Skip the fingerprint check. For deployments behind proxies
    /// that rewrite peer addresses mid-session.
    Loose,
}

/// Maps live connections to authenticated sessions.
///
/// One session per connection: binding again on the same connection
/// (a re-login) replaces the previous session.
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, Session>,
    protection: SessionProtection,
}

impl SessionRegistry {
    /// Creates an empty registry with the given protection mode.
    pub fn new(protection: SessionProtection) -> Self {
        Self {
            sessions: HashMap::new(),
            protection,
        }
    }

    /// Binds a session to a connection, replacing any prior session
    /// on the same connection.
    pub fn bind(&mut self, conn: ConnectionId, session: Session) {
        let username = session.identity.username.clone();
        if self.sessions.insert(conn, session).is_some() {
            tracing::info!(%conn, %username, "session replaced");
        } else {
            tracing::info!(%conn, %username, "session bound");
        }
    }

    /// Looks up the session bound to a connection.
    pub fn lookup(&self, conn: ConnectionId) -> Option<&Session> {
        self.sessions.get(&conn)
    }

    /// Returns the session for a connection after checking its
    /// fingerprint against the one captured at login.
    ///
    /// # Errors
    /// - [`SessionError::Unauthenticated`] — no session on this
    ///   connection
    /// - [`SessionError::FingerprintMismatch`] — strict mode and the
    ///   fingerprint changed; the session is removed before returning
    pub fn verify(
        &mut self,
        conn: ConnectionId,
        fingerprint: &Fingerprint,
    ) -> Result<&Session, SessionError> {
        let session = self
            .sessions
            .get(&conn)
            .ok_or(SessionError::Unauthenticated(conn))?;

        if self.protection == SessionProtection::Strict
            && session.fingerprint != *fingerprint
        {
            // Fail closed: the stale session must not stay usable.
            let username = session.identity.username.clone();
            self.sessions.remove(&conn);
            tracing::warn!(
                %conn,
                %username,
                "fingerprint mismatch, session invalidated"
            );
            return Err(SessionError::FingerprintMismatch(conn));
        }

        Ok(self.sessions.get(&conn).expect("checked above"))
    }

    /// Removes the session bound to a connection, if any.
    ///
    /// Returns the removed session so the caller can audit the logout.
    pub fn invalidate(&mut self, conn: ConnectionId) -> Option<Session> {
        let removed = self.sessions.remove(&conn);
        if let Some(session) = &removed {
            tracing::info!(
                %conn,
                username = %session.identity.username,
                "session invalidated"
            );
        }
        removed
    }

    /// Returns the number of bound sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are bound.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
