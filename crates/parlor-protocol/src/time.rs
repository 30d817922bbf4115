//! Wall-clock timestamps for messages and envelopes.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix
/// epoch.
///
/// Message timestamps are stamped by the server, never trusted from the
/// client. A clock before 1970 yields 0 rather than panicking.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
