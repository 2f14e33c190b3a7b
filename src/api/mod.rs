//! Outbound requests to the game server

pub mod rest;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{GameRound, PlaceWagerRequest, RoundRecord, WalletBalance, Wager, WagerId};

pub use rest::RestGameApi;

/// Request/response collaborator for round, wager and wallet data
///
/// None of these calls are retried; failures surface as transient notices.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Current round, `None` when the server has no round running
    async fn current_round(&self) -> Result<Option<GameRound>>;

    /// The player's wagers in the current round
    async fn current_wagers(&self) -> Result<Vec<Wager>>;

    async fn balance(&self) -> Result<WalletBalance>;

    async fn place_wager(&self, request: PlaceWagerRequest) -> Result<Wager>;

    async fn cancel_wager(&self, wager_id: WagerId) -> Result<()>;

    /// Most recent finished rounds, newest first
    async fn round_history(&self, limit: usize) -> Result<Vec<RoundRecord>>;
}
