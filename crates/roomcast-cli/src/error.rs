//! Error handling for the Roomcast CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Roomcast core error: {0}")]
    Core(#[from] roomcast_core::RoomcastError),

    #[error("Auth error: {0}")]
    Auth(#[from] roomcast_core::AuthError),

    #[error("Send failed: {0}")]
    Send(#[from] roomcast_core::SendError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Config(err.to_string())
    }
}
