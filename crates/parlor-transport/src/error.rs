//! Error type for the transport layer.
//!
//! Transport failures are I/O failures at heart; each variant keeps
//! the underlying `std::io::Error` as its source so callers can still
//! reach the OS-level cause. A cleanly closed connection is not an
//! error — `Connection::recv` reports it as `Ok(None)`.

/// Errors from binding, accepting, and moving bytes on a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listener or accepting a connection failed. Also
    /// covers a WebSocket handshake that never completes.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Writing to the peer failed; the connection is unusable.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading from the peer failed mid-stream (reset, protocol
    /// violation). Distinct from a clean close.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
