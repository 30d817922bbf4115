//! Validated password updates.
//!
//! The checks run in a fixed order, and the first failure wins:
//!
//! 1. The old password must match (generic `InvalidCredentials` —
//!    same rejection a failed login gets).
//! 2. The new password, trimmed, must be at least [`MIN_PASSWORD_LEN`]
//!    characters.
//! 3. The new password must differ from the old.
//! 4. The confirmation must equal the new password.
//!
//! Only then is the new hash persisted through the credential store.

use crate::credentials::{hash_password, verify_password};
use crate::{CredentialStore, PasswordError, SessionError};

/// Minimum password length, counted after trimming whitespace.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Validates and persists a password change for `username`.
///
/// # Errors
/// - [`SessionError::InvalidCredentials`] — unknown user or wrong old
///   password
/// - [`SessionError::Password`] — the new password failed validation
pub async fn update_password(
    store: &dyn CredentialStore,
    username: &str,
    old_password: &str,
    new_password: &str,
    confirm_new_password: &str,
) -> Result<(), SessionError> {
    let Some(identity) = store.find(username).await? else {
        return Err(SessionError::InvalidCredentials);
    };
    if !verify_password(old_password, &identity.password_hash) {
        return Err(SessionError::InvalidCredentials);
    }

    if new_password.trim().len() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort(MIN_PASSWORD_LEN).into());
    }
    if new_password == old_password {
        return Err(PasswordError::SameAsOld.into());
    }
    if confirm_new_password != new_password {
        return Err(PasswordError::ConfirmMismatch.into());
    }

    store
        .set_password(username, &hash_password(new_password))
        .await?;
    tracing::info!(%username, "password updated");
    Ok(())
}

// =========================================================================
// Tests
// =========================================================================
