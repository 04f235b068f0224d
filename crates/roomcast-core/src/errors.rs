//! Error types for the Roomcast protocol
//!
//! This module contains all error types used throughout the protocol: auth
//! errors, channel errors, send errors, wire errors, and the main
//! RoomcastError type that unifies them.

use thiserror::Error;

use crate::types::RoomId;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Authentication errors from the identity provider seam.
///
/// Surfaced to the caller as a degraded-UI state; never retried
/// automatically.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Sign-in with provider {provider} failed: {reason}")]
    SignInFailed { provider: String, reason: String },
    #[error("Sign-out failed: {reason}")]
    SignOutFailed { reason: String },
    #[error("No active session")]
    NotSignedIn,
    #[error("Missing or empty access token")]
    MissingToken,
}

/// Channel lifecycle errors
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// No underlying connection is established; the caller decides whether
    /// to retry.
    #[error("Channel for room {room} is unavailable: {reason}")]
    ChannelUnavailable { room: RoomId, reason: String },
    #[error("Subscribe to room {room} failed: {reason}")]
    SubscribeFailed { room: RoomId, reason: String },
    #[error("Channel for room {room} was already left")]
    AlreadyLeft { room: RoomId },
    #[error("Event queue for room {room} is full (capacity: {capacity})")]
    QueueFull { room: RoomId, capacity: usize },
}

/// Broadcast send errors.
///
/// Returned to the caller so the input can be preserved for a manual retry.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("Send on room {room} failed: no established connection")]
    NotConnected { room: RoomId },
    #[error("Send on room {room} failed: {reason}")]
    TransportFailed { room: RoomId, reason: String },
}

/// Wire framing errors
#[derive(Debug, Clone, Error)]
pub enum WireError {
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },
    #[error("Unexpected binary frame ({len} bytes)")]
    UnexpectedBinary { len: usize },
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the Roomcast protocol
#[derive(Debug, Clone, Error)]
pub enum RoomcastError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] crate::channel_state::StateTransitionError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl RoomcastError {
    /// Create a channel-unavailable error for a room
    pub fn channel_unavailable(room: RoomId, reason: impl Into<String>) -> Self {
        RoomcastError::Channel(ChannelError::ChannelUnavailable {
            room,
            reason: reason.into(),
        })
    }

    /// Create a malformed-frame error
    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        RoomcastError::Wire(WireError::MalformedFrame {
            reason: reason.into(),
        })
    }

    /// Create a configuration error
    pub fn config_error(reason: impl Into<String>) -> Self {
        RoomcastError::Configuration {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, RoomcastError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RoomcastError::channel_unavailable(RoomId::new("room_one"), "socket closed");
        assert_eq!(
            err.to_string(),
            "Channel error: Channel for room room_one is unavailable: socket closed"
        );
    }

    #[test]
    fn test_send_error_carries_room() {
        let err = SendError::NotConnected {
            room: RoomId::new("room_one"),
        };
        let unified: RoomcastError = err.into();
        assert!(matches!(
            unified,
            RoomcastError::Send(SendError::NotConnected { .. })
        ));
    }
}
