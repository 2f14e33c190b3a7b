//! Wager ledger for the active round

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::protocol::{RoundId, Wager};

/// Totals over the live ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub wager_count: usize,
    pub total_staked: Decimal,
    pub potential_payout: Decimal,
}

/// Wagers captured when betting closed
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenLedger {
    pub round_id: RoundId,
    pub wagers: Vec<Wager>,
}

/// Player wagers refreshed from the server, plus the snapshot taken at
/// betting close
///
/// The estimator reads only the frozen snapshot, so a refresh landing after
/// betting closed cannot swap in another round's wagers.
#[derive(Debug, Default)]
pub struct BetLedgerCache {
    wagers: Vec<Wager>,
    frozen: Option<FrozenLedger>,
}

impl BetLedgerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live wagers wholesale
    pub fn replace(&mut self, wagers: Vec<Wager>) {
        debug!(count = wagers.len(), "ledger refreshed");
        self.wagers = wagers;
    }

    pub fn wagers(&self) -> &[Wager] {
        &self.wagers
    }

    /// Drop the live wagers for a new round; the frozen snapshot stays
    pub fn clear(&mut self) {
        self.wagers.clear();
    }

    /// Capture the live wagers belonging to `round_id`
    pub fn freeze(&mut self, round_id: RoundId) -> &FrozenLedger {
        let wagers: Vec<Wager> = self
            .wagers
            .iter()
            .filter(|wager| wager.round_id == round_id)
            .cloned()
            .collect();
        debug!(round_id, count = wagers.len(), "ledger frozen");
        self.frozen.insert(FrozenLedger { round_id, wagers })
    }

    /// The frozen wagers, only if they were captured for `round_id`
    pub fn frozen_for(&self, round_id: RoundId) -> Option<&[Wager]> {
        self.frozen
            .as_ref()
            .filter(|frozen| frozen.round_id == round_id)
            .map(|frozen| frozen.wagers.as_slice())
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            wager_count: self.wagers.len(),
            total_staked: self.wagers.iter().map(|w| w.amount).sum(),
            potential_payout: self.wagers.iter().map(|w| w.potential_payout).sum(),
        }
    }
}
