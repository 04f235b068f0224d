//! Roomcast Core Protocol Implementation
//!
//! This crate provides the foundational types, wire frames, and channel
//! lifecycle contract for the Roomcast real-time chat relay: broadcast
//! fan-out, presence synchronization, and the session seam toward the
//! identity provider.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel_state;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod message;
pub mod session;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel_state::{
    ChannelEffect, ChannelLifecycleEvent, ChannelState, ChannelTransition, StateTransitionError,
};
pub use config::ChannelConfig;
pub use dedup::{DedupStats, DedupWindow};
pub use errors::{AuthError, ChannelError, Result, RoomcastError, SendError, WireError};
pub use message::{ChatMessage, PresenceMeta, PresenceSet, UserProfile};
pub use session::{Session, SessionStore, SignInProvider};
pub use types::{MessageId, RoomId, Timestamp, UserId};
pub use wire::{ClientFrame, ErrorCode, ServerFrame, MESSAGE_EVENT};
