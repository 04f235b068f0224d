//! Roomcast CLI
//!
//! Terminal front end for the Roomcast chat relay: interactive chat,
//! one-shot sends, and presence inspection.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::ChatApp;
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
