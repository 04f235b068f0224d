//! Channel buffer configuration

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the bounded queues that carry channel traffic.
///
/// All channel events for one room flow through a single bounded queue to a
/// single consumer; these sizes bound memory under a slow consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Capacity of the per-channel event queue (broadcasts + presence syncs)
    pub event_buffer_size: usize,
    /// Capacity of the outbound frame queue toward the relay
    pub outbound_buffer_size: usize,
    /// Capacity of each room's fan-out buffer on the relay
    pub fanout_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 256,
            outbound_buffer_size: 64,
            fanout_buffer_size: 256,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_nonzero() {
        let config = ChannelConfig::default();
        assert!(config.event_buffer_size > 0);
        assert!(config.outbound_buffer_size > 0);
        assert!(config.fanout_buffer_size > 0);
    }
}
