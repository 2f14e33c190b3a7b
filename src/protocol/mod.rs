//! Wire protocol for the live wheel game
//!
//! Round snapshots, wagers and outcome notices exchanged with the game
//! server, the STOMP framing used by the push channel, and the fixed table
//! constants both sides agree on.

pub mod stomp;
pub mod table;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub use stomp::{Frame, FrameCommand};
pub use table::{pocket_color, pocket_index, PocketColor, BLACK_NUMBERS, POCKET_COUNT, RED_NUMBERS, WHEEL_ORDER};

/// Round identifier assigned by the server
pub type RoundId = u64;

/// Wager identifier assigned by the server
pub type WagerId = u64;

/// Round status as broadcast by the server
///
/// Anything the client does not recognise is kept as `Unknown` so that a
/// garbled status never fails the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameStatus {
    BettingOpen,
    BettingClosed,
    Spinning,
    Finished,
    Settled,
    Unknown(String),
}

impl GameStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::BettingOpen => "BETTING_OPEN",
            Self::BettingClosed => "BETTING_CLOSED",
            Self::Spinning => "SPINNING",
            Self::Finished => "FINISHED",
            Self::Settled => "SETTLED",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Wagers may be placed or cancelled only in this status
    pub fn accepts_wagers(&self) -> bool {
        matches!(self, Self::BettingOpen)
    }
}

impl From<String> for GameStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "BETTING_OPEN" => Self::BettingOpen,
            "BETTING_CLOSED" => Self::BettingClosed,
            "SPINNING" => Self::Spinning,
            "FINISHED" => Self::Finished,
            "SETTLED" => Self::Settled,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<GameStatus> for String {
    fn from(status: GameStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current round as seen by every player
///
/// Each snapshot replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRound {
    #[serde(rename = "gameId")]
    pub round_id: RoundId,
    pub status: GameStatus,
    #[serde(default)]
    pub remaining_seconds: i64,
    #[serde(default)]
    pub result_hash: String,
    #[serde(default)]
    pub winning_number: Option<u8>,
    #[serde(default)]
    pub winning_color: Option<PocketColor>,
    #[serde(default)]
    pub result_key: Option<String>,
}

/// The ten wager variants offered by the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetType {
    Straight,
    Split,
    Street,
    Corner,
    Line,
    Column,
    Dozen,
    Color,
    Parity,
    Half,
}

impl BetType {
    pub const ALL: [BetType; 10] = [
        BetType::Straight,
        BetType::Split,
        BetType::Street,
        BetType::Corner,
        BetType::Line,
        BetType::Column,
        BetType::Dozen,
        BetType::Color,
        BetType::Parity,
        BetType::Half,
    ];

    /// Total return per unit staked when the wager wins (stake included)
    pub fn multiplier(&self) -> u32 {
        match self {
            Self::Straight => 36,
            Self::Split => 18,
            Self::Street => 12,
            Self::Corner => 9,
            Self::Line => 6,
            Self::Column | Self::Dozen => 3,
            Self::Color | Self::Parity | Self::Half => 2,
        }
    }

    /// Number of pockets an inside wager must name
    pub fn inside_pockets(&self) -> Option<usize> {
        match self {
            Self::Straight => Some(1),
            Self::Split => Some(2),
            Self::Street => Some(3),
            Self::Corner => Some(4),
            Self::Line => Some(6),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Straight => "STRAIGHT",
            Self::Split => "SPLIT",
            Self::Street => "STREET",
            Self::Corner => "CORNER",
            Self::Line => "LINE",
            Self::Column => "COLUMN",
            Self::Dozen => "DOZEN",
            Self::Color => "COLOR",
            Self::Parity => "PARITY",
            Self::Half => "HALF",
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        BetType::ALL
            .iter()
            .copied()
            .find(|bet_type| bet_type.as_str() == upper)
            .ok_or_else(|| Error::InvalidWager(format!("unknown bet type '{}'", s)))
    }
}

/// A wager placed by this player in the active round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wager {
    pub id: WagerId,
    #[serde(rename = "gameId")]
    pub round_id: RoundId,
    pub bet_type: BetType,
    pub bet_value: String,
    pub amount: Decimal,
    #[serde(default)]
    pub potential_payout: Decimal,
    #[serde(default)]
    pub multiplier: Decimal,
    #[serde(default)]
    pub settled: bool,
    #[serde(default)]
    pub win_amount: Option<Decimal>,
    #[serde(default)]
    pub created_at: String,
}

/// Body of a wager placement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceWagerRequest {
    pub bet_type: BetType,
    pub bet_value: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Authoritative balance as reported by the wallet endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub balance: Decimal,
}

/// One resolved wager inside an outcome notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedWager {
    pub bet_id: WagerId,
    pub bet_type: String,
    pub bet_value: String,
    pub amount: Decimal,
    pub won: bool,
    #[serde(default)]
    pub win_amount: Decimal,
}

/// Personal notice pushed once the server has settled this player's wagers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WagerOutcomeNotice {
    #[serde(rename = "gameId")]
    pub round_id: RoundId,
    pub winning_number: u8,
    pub winning_color: String,
    #[serde(default)]
    pub bets: Vec<ResolvedWager>,
    pub total_won: Decimal,
    pub new_balance: Decimal,
}

/// Broadcast chat line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub username: String,
    pub message: String,
    #[serde(default)]
    pub created_at: String,
}

/// A finished round from the history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub id: RoundId,
    pub status: GameStatus,
    pub winning_number: u8,
    pub winning_color: PocketColor,
    #[serde(default)]
    pub result_hash: String,
    #[serde(default)]
    pub result_key: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_snapshot_parsing() {
        let json = r#"{"gameId":42,"status":"FINISHED","remainingSeconds":0,
            "resultHash":"ab12","winningNumber":17,"winningColor":"BLACK","resultKey":"k"}"#;
        let round: GameRound = serde_json::from_str(json).unwrap();
        assert_eq!(round.round_id, 42);
        assert_eq!(round.status, GameStatus::Finished);
        assert_eq!(round.winning_number, Some(17));
        assert_eq!(round.winning_color, Some(PocketColor::Black));
    }

    #[test]
    fn test_null_result_fields() {
        let json = r#"{"gameId":7,"status":"BETTING_OPEN","remainingSeconds":12,
            "resultHash":"ff","winningNumber":null,"winningColor":null,"resultKey":null}"#;
        let round: GameRound = serde_json::from_str(json).unwrap();
        assert_eq!(round.winning_number, None);
        assert_eq!(round.remaining_seconds, 12);
        assert!(round.status.accepts_wagers());
    }

    #[test]
    fn test_unknown_status_is_kept() {
        let json = r#"{"gameId":7,"status":"WARMING_UP"}"#;
        let round: GameRound = serde_json::from_str(json).unwrap();
        assert_eq!(round.status, GameStatus::Unknown("WARMING_UP".to_string()));
        assert!(!round.status.is_known());
    }

    #[test]
    fn test_wager_parsing_with_float_amounts() {
        let json = r#"{"id":3,"gameId":42,"betType":"STRAIGHT","betValue":"17","amount":10.5,
            "potentialPayout":378,"multiplier":36,"settled":false,"winAmount":null,
            "createdAt":"2025-05-01T10:00:00"}"#;
        let wager: Wager = serde_json::from_str(json).unwrap();
        assert_eq!(wager.bet_type, BetType::Straight);
        assert_eq!(wager.amount, dec!(10.5));
        assert_eq!(wager.potential_payout, dec!(378));
    }

    #[test]
    fn test_place_request_serializes_numbers() {
        let request = PlaceWagerRequest {
            bet_type: BetType::Color,
            bet_value: "RED".to_string(),
            amount: dec!(25),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["betType"], "COLOR");
        assert_eq!(value["amount"], serde_json::json!(25.0));
    }

    #[test]
    fn test_bet_type_from_str() {
        assert_eq!("straight".parse::<BetType>().unwrap(), BetType::Straight);
        assert_eq!(" HALF ".parse::<BetType>().unwrap(), BetType::Half);
        assert!("TRIO".parse::<BetType>().is_err());
    }

    #[test]
    fn test_multiplier_table() {
        let table: Vec<u32> = BetType::ALL.iter().map(BetType::multiplier).collect();
        assert_eq!(table, vec![36, 18, 12, 9, 6, 3, 3, 2, 2, 2]);
    }
}
