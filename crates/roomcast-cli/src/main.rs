//! Roomcast CLI - main entry point

use clap::Parser;
use tracing::{error, info};

use roomcast_cli::{app::ChatApp, cli::Cli, cli::Commands, config::AppConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = load_configuration(&cli)?;
    if let Some(relay) = &cli.relay {
        config.relay.url = relay.clone();
    }

    let outcome = match cli.command {
        Commands::Chat { name, room } => {
            let app = ChatApp::new(config, &name)?;
            let room = app.resolve_room(room);
            app.run_chat(room).await
        }
        Commands::Send { name, room, message } => {
            let app = ChatApp::new(config, &name)?;
            let room = app.resolve_room(room);
            app.run_send(room, &message).await
        }
        Commands::Who { name, room } => {
            let app = ChatApp::new(config, &name)?;
            let room = app.resolve_room(room);
            app.run_who(room).await
        }
    };

    if let Err(e) = outcome {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("roomcast exited");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
    }
    AppConfig::load(cli.config.as_deref())
}
