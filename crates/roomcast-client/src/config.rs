//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use roomcast_core::ChannelConfig;

// ----------------------------------------------------------------------------
// Reconnect Policy
// ----------------------------------------------------------------------------

/// Exponential backoff policy for transport reconnection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts
    pub max_backoff: Duration,
    /// Multiplier applied per failed attempt
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay for the given attempt number (attempts start at 1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = self.backoff_multiplier.powi(exponent as i32);
        let delay = self.initial_backoff.mul_f64(factor.max(1.0));
        delay.min(self.max_backoff)
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Configuration for the connection manager and its channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay WebSocket URL, e.g. `ws://127.0.0.1:7350`
    pub relay_url: String,
    /// Channel buffer sizes
    pub channel: ChannelConfig,
    /// Reconnect backoff policy
    pub reconnect: ReconnectPolicy,
    /// How often to probe the relay for liveness
    pub heartbeat_interval: Duration,
    /// Missed-ack window after which the transport counts as lost
    pub heartbeat_timeout: Duration,
    /// How long to wait for the relay's join acknowledgment
    pub join_timeout: Duration,
}

impl ClientConfig {
    /// Configuration pointing at a relay URL, with production defaults
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            channel: ChannelConfig::default(),
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_timeout: Duration::from_secs(45),
            join_timeout: Duration::from_secs(10),
        }
    }

    /// Configuration for tests: tight timings so reconnect scenarios run fast
    pub fn for_tests(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            channel: ChannelConfig::default(),
            reconnect: ReconnectPolicy {
                initial_backoff: Duration::from_millis(50),
                max_backoff: Duration::from_millis(400),
                backoff_multiplier: 2.0,
            },
            heartbeat_interval: Duration::from_millis(500),
            heartbeat_timeout: Duration::from_millis(1_500),
            join_timeout: Duration::from_secs(5),
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
    fn test_backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        // Capped at the maximum
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(30), Duration::from_millis(350));
    }

    #[test]
    fn test_defaults_are_sane() {
        let config = ClientConfig::new("ws://127.0.0.1:7350");
        assert!(config.heartbeat_timeout > config.heartbeat_interval);
        assert!(config.reconnect.max_backoff >= config.reconnect.initial_backoff);
    }
}
