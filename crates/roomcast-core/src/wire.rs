//! Wire protocol frames
//!
//! All client/relay communication flows through these typed frames, encoded
//! as internally-tagged JSON text over the WebSocket. Unknown or malformed
//! frames are a [`WireError`], never a panic: the peer gets an `Error` frame
//! and the connection survives.

use serde::{Deserialize, Serialize};

use crate::errors::WireError;
use crate::message::{ChatMessage, PresenceMeta};
use crate::types::{RoomId, UserId};

/// Broadcast event name used for chat messages, matching the one observable
/// event kind of the original client.
pub const MESSAGE_EVENT: &str = "message";

// ----------------------------------------------------------------------------
// Client Frames: client -> relay
// ----------------------------------------------------------------------------

/// Frames sent from a channel client to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Open a logical channel on a room. Idempotent: rejoining an already
    /// joined room re-subscribes.
    Join {
        room: RoomId,
        /// Opaque bearer token from the identity provider
        token: String,
        /// Presence key for this connection
        presence_key: UserId,
    },
    /// Announce local presence. Must be re-sent after reconnect.
    Track { meta: PresenceMeta },
    /// Fire-and-forget broadcast to all current subscribers of the room
    Broadcast { event: String, message: ChatMessage },
    /// Release the channel; the relay stops all further delivery
    Leave,
    /// Liveness probe; the relay echoes the nonce back
    Heartbeat { nonce: u64 },
}

// ----------------------------------------------------------------------------
// Server Frames: relay -> client
// ----------------------------------------------------------------------------

/// Error codes carried on relay error frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Join carried a missing or empty token
    Unauthorized,
    /// Frame arrived before a successful join
    NotJoined,
    /// Frame could not be decoded
    BadFrame,
}

/// Frames sent from the relay to a channel client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Join acknowledged; the connection is subscribed to the room
    Joined { room: RoomId },
    /// A broadcast fanned out to every subscriber, sender included
    Broadcast { event: String, message: ChatMessage },
    /// Full recomputed membership set for the room. Clients replace their
    /// local mirror wholesale; this is never a delta.
    PresenceSync { members: Vec<UserId> },
    /// Heartbeat echo
    HeartbeatAck { nonce: u64 },
    /// Protocol-level failure; the connection stays open
    Error { code: ErrorCode, reason: String },
}

// ----------------------------------------------------------------------------
// Codec Helpers
// ----------------------------------------------------------------------------

/// Encode a frame as a JSON text payload
pub fn encode<F: Serialize>(frame: &F) -> Result<String, WireError> {
    serde_json::to_string(frame).map_err(|e| WireError::MalformedFrame {
        reason: e.to_string(),
    })
}

/// Decode a JSON text payload into a frame
pub fn decode<'a, F: Deserialize<'a>>(text: &'a str) -> Result<F, WireError> {
    serde_json::from_str(text).map_err(|e| WireError::MalformedFrame {
        reason: e.to_string(),
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
