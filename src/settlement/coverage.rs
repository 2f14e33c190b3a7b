//! Which pockets a wager covers

use std::collections::BTreeSet;

use crate::protocol::table::{pocket_color, PocketColor, POCKET_COUNT};
use crate::protocol::BetType;

const HIGHEST_POCKET: u8 = (POCKET_COUNT - 1) as u8;

/// Parsed wager value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// Inside bets name their pockets explicitly
    Pockets(BTreeSet<u8>),
    Column(u8),
    Dozen(u8),
    Color(PocketColor),
    Even,
    Odd,
    Low,
    High,
}

impl Coverage {
    /// Parse `value` for `bet_type`; `None` if it does not describe a valid wager
    pub fn parse(bet_type: BetType, value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_uppercase();
        match bet_type {
            BetType::Straight
            | BetType::Split
            | BetType::Street
            | BetType::Corner
            | BetType::Line => {
                let expected = bet_type.inside_pockets()?;
                let pockets = parse_pockets(&value)?;
                (pockets.len() == expected).then_some(Self::Pockets(pockets))
            }
            BetType::Column => match value.as_str() {
                "1" | "1ST" => Some(Self::Column(1)),
                "2" | "2ND" => Some(Self::Column(2)),
                "3" | "3RD" => Some(Self::Column(3)),
                _ => None,
            },
            BetType::Dozen => match value.as_str() {
                "1" | "1ST" => Some(Self::Dozen(1)),
                "2" | "2ND" => Some(Self::Dozen(2)),
                "3" | "3RD" => Some(Self::Dozen(3)),
                _ => None,
            },
            BetType::Color => match value.as_str() {
                "RED" => Some(Self::Color(PocketColor::Red)),
                "BLACK" => Some(Self::Color(PocketColor::Black)),
                _ => None,
            },
            BetType::Parity => match value.as_str() {
                "EVEN" => Some(Self::Even),
                "ODD" => Some(Self::Odd),
                _ => None,
            },
            BetType::Half => match value.as_str() {
                "LOW" | "1-18" => Some(Self::Low),
                "HIGH" | "19-36" => Some(Self::High),
                _ => None,
            },
        }
    }

    /// Whether `number` wins this wager. Zero only wins when named explicitly.
    pub fn covers(&self, number: u8) -> bool {
        if number > HIGHEST_POCKET {
            return false;
        }
        if let Self::Pockets(pockets) = self {
            return pockets.contains(&number);
        }
        if number == 0 {
            return false;
        }
        match self {
            Self::Pockets(_) => false,
            Self::Column(column) => match number % 3 {
                0 => *column == 3,
                rest => *column == rest,
            },
            Self::Dozen(dozen) => (number - 1) / 12 + 1 == *dozen,
            Self::Color(color) => pocket_color(number) == Some(*color),
            Self::Even => number % 2 == 0,
            Self::Odd => number % 2 == 1,
            Self::Low => number <= 18,
            Self::High => number >= 19,
        }
    }
}

fn parse_pockets(value: &str) -> Option<BTreeSet<u8>> {
    let mut pockets = BTreeSet::new();
    for part in value
        .split(|c: char| matches!(c, ',' | '-' | '/' | ' '))
        .filter(|part| !part.is_empty())
    {
        let number: u8 = part.parse().ok()?;
        if number > HIGHEST_POCKET || !pockets.insert(number) {
            return None;
        }
    }
    Some(pockets)
}
