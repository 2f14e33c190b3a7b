//! Command implementations for the livewheel CLI

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use livewheel::api::GameApi;
use livewheel::feedback::LogFeedback;
use livewheel::protocol::{BetType, PlaceWagerRequest};
use livewheel::transport::WsConnector;
use livewheel::{Client, ClientEvent, Config, Error, RestGameApi, Result};
use rust_decimal::Decimal;

/// Follow the live game until interrupted or `rounds` results are revealed
pub async fn watch_command(config: Config, rounds: Option<u32>) -> Result<()> {
    let api = Arc::new(RestGameApi::new(&config.server)?);
    let handle = Client::start(config, api, Arc::new(WsConnector), Arc::new(LogFeedback))?;
    let mut events = handle.subscribe();
    let mut revealed = 0u32;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(ClientEvent::ConnectionChanged { connected, error }) => {
                    if connected {
                        println!("connected");
                    } else {
                        println!("disconnected: {}", error.unwrap_or_else(|| "closed".to_string()));
                    }
                }
                Ok(ClientEvent::RoundChanged(round)) => {
                    info!(round_id = round.round_id, status = %round.status, remaining = round.remaining_seconds, "round");
                }
                Ok(ClientEvent::ResultRevealed(result)) => {
                    let color = result.color.map(|c| format!("{:?}", c)).unwrap_or_default();
                    println!("round {:?}: {} {}", result.round_id, result.winning_number, color);
                    revealed += 1;
                    if rounds.is_some_and(|limit| revealed >= limit) {
                        break;
                    }
                }
                Ok(ClientEvent::Celebrate { round_id, amount }) => {
                    println!("round {}: estimated win {}", round_id, amount);
                }
                Ok(ClientEvent::Commiserate { round_id, amount }) => {
                    println!("round {}: estimated loss {}", round_id, amount);
                }
                Ok(ClientEvent::BalanceUpdated(balance)) => println!("balance: {}", balance),
                Ok(ClientEvent::Notice { message }) => println!("! {}", message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await
}

/// Place one wager directly through the API
pub async fn bet_command(config: &Config, bet_type: &str, value: String, amount: Decimal) -> Result<()> {
    let api = RestGameApi::new(&config.server)?;
    let bet_type: BetType = bet_type.parse()?;
    let round = api
        .current_round()
        .await?
        .ok_or_else(|| Error::InvalidWager("No round is running".to_string()))?;
    if !round.status.accepts_wagers() {
        return Err(Error::InvalidWager(format!("Betting is closed ({})", round.status)));
    }
    let balance = api.balance().await?.balance;
    if amount > balance {
        return Err(Error::InsufficientBalance);
    }

    let wager = api
        .place_wager(PlaceWagerRequest {
            bet_type,
            bet_value: value,
            amount,
        })
        .await?;
    println!(
        "placed wager {} on {} {} for {} (pays {})",
        wager.id, wager.bet_type, wager.bet_value, wager.amount, wager.potential_payout
    );
    Ok(())
}

pub async fn cancel_command(config: &Config, wager_id: u64) -> Result<()> {
    let api = RestGameApi::new(&config.server)?;
    api.cancel_wager(wager_id).await?;
    println!("cancelled wager {}", wager_id);
    Ok(())
}

pub async fn balance_command(config: &Config) -> Result<()> {
    let api = RestGameApi::new(&config.server)?;
    let wallet = api.balance().await?;
    println!("balance: {}", wallet.balance);
    Ok(())
}

pub async fn history_command(config: &Config, limit: usize) -> Result<()> {
    let api = RestGameApi::new(&config.server)?;
    for record in api.round_history(limit).await? {
        println!(
            "#{:<6} {:>2} {:<5} {}",
            record.id,
            record.winning_number,
            format!("{:?}", record.winning_color),
            record.result_hash
        );
    }
    Ok(())
}

pub fn config_command(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
