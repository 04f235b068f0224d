//! Error handling for the Roomcast relay

use thiserror::Error;

/// Relay-specific error types
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Roomcast core error: {0}")]
    Core(#[from] roomcast_core::RoomcastError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
