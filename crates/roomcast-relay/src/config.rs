//! Relay configuration

use serde::{Deserialize, Serialize};

use roomcast_core::ChannelConfig;

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Configuration for the relay listener and per-room fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Socket address to listen on
    pub bind_addr: String,
    /// Upper bound on accepted text frame size in bytes
    pub max_frame_bytes: usize,
    /// Channel buffer sizes
    pub channel: ChannelConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7350".to_string(),
            max_frame_bytes: 64 * 1024,
            channel: ChannelConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Configuration for tests: ephemeral port on loopback
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
