//! Hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by all room actors in a hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of each connection's outbound event queue. When a
    /// slow client's queue is full, further events for it are dropped
    /// rather than stalling the room.
    pub outbound_capacity: usize,

    /// Capacity of each room actor's command channel. When full,
    /// callers wait (bounded channel backpressure).
    pub command_capacity: usize,

    /// How many times to try appending a message to the log before
    /// giving up on the broadcast.
    pub append_attempts: u32,

    /// Base delay between append attempts; attempt `n` waits
    /// `n * append_backoff`.
    pub append_backoff: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            command_capacity: 64,
            append_attempts: 3,
            append_backoff: Duration::from_millis(50),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_default() {
        let config = HubConfig::default();
        assert_eq!(config.outbound_capacity, 64);
        assert_eq!(config.command_capacity, 64);
        assert_eq!(config.append_attempts, 3);
        assert_eq!(config.append_backoff, Duration::from_millis(50));
    }
}
