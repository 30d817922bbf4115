//! Error types for the session layer.

use parlor_transport::ConnectionId;

/// Errors that can occur during authentication and session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The username was unknown or the password was wrong.
    ///
    /// Deliberately one variant with one message for both cases, so a
    /// caller probing for valid usernames learns nothing from the
    /// response shape.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The connection has no bound session. Sent events other than
    /// `Login` on a fresh connection land here.
    #[error("connection {0} is not authenticated")]
    Unauthenticated(ConnectionId),

    /// The connection's fingerprint no longer matches the one captured
    /// at login. Under strict protection the session is invalidated.
    #[error("session fingerprint mismatch on {0}")]
    FingerprintMismatch(ConnectionId),

    /// The credential store could not be reached.
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// Password update validation failed.
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Validation failures for password updates.
///
/// These are safe to echo back to the client verbatim — unlike
/// [`SessionError::InvalidCredentials`], they reveal nothing about
/// other accounts.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// The new password is shorter than the minimum after trimming.
    #[error("new password must be at least {0} characters")]
    TooShort(usize),

    /// The new password is identical to the old one.
    #[error("new password must differ from the old password")]
    SameAsOld,

    /// The confirmation does not match the new password.
    #[error("password confirmation does not match")]
    ConfirmMismatch,
}
