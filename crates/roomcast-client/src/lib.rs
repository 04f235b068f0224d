//! Roomcast Channel Client
//!
//! Client side of the Roomcast messaging contract: a process-scoped
//! connection manager, per-room channels with ordered event delivery and
//! receiver-side deduplication, automatic reconnection with presence
//! re-announcement, a local session store, and an observable chat state
//! holder for render layers.

pub mod channel;
pub mod config;
pub mod connection;
pub mod session;
pub mod state;

pub use channel::{Channel, ChannelEvent, ChannelHandle, ChannelStatus, SendOutcome};
pub use config::{ClientConfig, ReconnectPolicy};
pub use connection::ConnectionManager;
pub use session::LocalSessionStore;
pub use state::{ChatState, StateSnapshot};
