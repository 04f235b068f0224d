//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Relay URL override (e.g. ws://127.0.0.1:7350)
    #[arg(short, long)]
    pub relay: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start interactive chat mode
    Chat {
        /// Your display name
        #[arg(short, long, default_value = "Anonymous")]
        name: String,

        /// Room to join (defaults to the configured room)
        #[arg(long)]
        room: Option<String>,
    },
    /// Send a single message and exit
    Send {
        /// Your display name
        #[arg(short, long, default_value = "Anonymous")]
        name: String,

        /// Room to send into (defaults to the configured room)
        #[arg(long)]
        room: Option<String>,

        /// Message content
        message: String,
    },
    /// Show who is currently online and exit
    Who {
        /// Your display name
        #[arg(short, long, default_value = "Anonymous")]
        name: String,

        /// Room to inspect (defaults to the configured room)
        #[arg(long)]
        room: Option<String>,
    },
}
