//! Command-line interface definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

/// Command-line interface for livewheel
#[derive(Parser)]
#[command(name = "livewheel", version)]
#[command(about = "Live roulette client: follow rounds, place and cancel wagers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML); defaults to the LIVEWHEEL_ENV environment
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bearer token for the player session
    #[arg(short, long, env = "LIVEWHEEL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Follow the live game, logging rounds, results and verdicts
    Watch {
        /// Stop after this many settled rounds
        #[arg(long)]
        rounds: Option<u32>,
    },

    /// Place a wager in the current round
    Bet {
        #[arg(long = "type")]
        bet_type: String,
        #[arg(long)]
        value: String,
        #[arg(long)]
        amount: Decimal,
    },

    /// Cancel a wager by id
    Cancel { wager_id: u64 },

    /// Show wallet balance
    Balance,

    /// Show recent round results
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Print the effective configuration
    Config,
}

impl Commands {
    /// Whether the command needs a player session
    pub fn requires_token(&self) -> bool {
        matches!(
            self,
            Commands::Bet { .. } | Commands::Cancel { .. } | Commands::Balance
        )
    }
}
