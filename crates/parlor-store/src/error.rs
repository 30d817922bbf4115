//! Error types for the store layer.

/// Errors that can occur in the message log.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database could not serve the request.
    #[cfg(feature = "sqlite")]
    #[error("message log unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// The log rejected an append for internal reasons.
    #[error("append failed: {0}")]
    AppendFailed(String),
}
