//! Roomcast Relay
//!
//! The bespoke real-time relay behind the Roomcast chat client: WebSocket
//! listener, per-room echo-inclusive broadcast fan-out, and authoritative
//! presence with full-set synchronization.

pub mod config;
pub mod error;
pub mod room;
pub mod server;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use room::{ConnId, RoomRegistry};
pub use server::RelayServer;
