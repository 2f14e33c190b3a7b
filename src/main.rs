use tracing::info;

use livewheel::{logging, Config, Error, Result};

mod app_config;
mod commands;

use app_config::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    use clap::Parser;

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };
    if let Some(token) = cli.token {
        config.server.auth_token = Some(token);
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init(&config.logging);

    if cli.command.requires_token() && config.server.auth_token.is_none() {
        return Err(Error::NotAuthenticated);
    }

    info!(environment = ?config.app.environment, "livewheel {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Watch { rounds } => commands::watch_command(config, rounds).await,
        Commands::Bet {
            bet_type,
            value,
            amount,
        } => commands::bet_command(&config, &bet_type, value, amount).await,
        Commands::Cancel { wager_id } => commands::cancel_command(&config, wager_id).await,
        Commands::Balance => commands::balance_command(&config).await,
        Commands::History { limit } => commands::history_command(&config, limit).await,
        Commands::Config => commands::config_command(&config),
    }
}
