//! Roomcast relay - server entry point

use clap::Parser;
use tracing::info;

use roomcast_relay::{RelayConfig, RelayServer, Result};

#[derive(Parser)]
#[command(author, version, about = "Roomcast real-time chat relay", long_about = None)]
struct Args {
    /// Socket address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = RelayConfig::default();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let server = RelayServer::bind(config).await?;
    info!(addr = %server.local_addr(), "roomcast relay starting");
    server.run().await
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}
