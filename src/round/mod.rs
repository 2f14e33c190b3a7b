//! Round phase tracking
//!
//! `GamePhaseStateMachine` keeps the latest round snapshot and turns status
//! changes into `PhaseEffect`s for the client loop to carry out. Each status
//! dispatches at most once per round: a repeated or out-of-order status is
//! stored but triggers nothing. Snapshots from a round older than the latest
//! one are dropped.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::protocol::{GameRound, GameStatus, RoundId};

/// Seconds left in betting at which countdown ticks start
pub const COUNTDOWN_TICK_FROM: i64 = 5;

/// Side effect requested by a phase edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEffect {
    /// A round not seen before opened betting: clear the live ledger,
    /// refresh balance and wagers
    NewRound { round_id: RoundId },
    /// Betting opened; a wheel still spinning from a missed finish stops
    HaltSpin,
    /// Capture the ledger for the estimator
    FreezeLedger { round_id: RoundId },
    /// Betting closed cue
    BettingClosedTick,
    /// Countdown cue for a distinct remaining-second value
    CountdownTick { remaining: i64 },
    StartSpin,
    StartSettle { winning_number: u8 },
    /// Run the provisional estimator (it guards against repeats itself)
    Estimate { round_id: RoundId, winning_number: u8 },
}

/// Edge-triggered round status machine
#[derive(Debug, Default)]
pub struct GamePhaseStateMachine {
    current: Option<GameRound>,
    last_edge: Option<(RoundId, GameStatus)>,
    /// Highest round id seen so far
    latest_round: Option<RoundId>,
    /// Statuses already dispatched for `latest_round`
    dispatched: HashSet<GameStatus>,
    last_countdown: Option<(RoundId, i64)>,
}

impl GamePhaseStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot, retained across disconnects
    pub fn current(&self) -> Option<&GameRound> {
        self.current.as_ref()
    }

    /// Status of the last recognised edge
    pub fn status(&self) -> Option<&GameStatus> {
        self.last_edge.as_ref().map(|(_, status)| status)
    }

    pub fn round_id(&self) -> Option<RoundId> {
        self.current.as_ref().map(|round| round.round_id)
    }

    /// Whether the current round accepts wagers
    pub fn accepts_wagers(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|round| round.status.accepts_wagers())
    }

    /// Record a snapshot and return the effects of any edge it crosses
    pub fn apply(&mut self, round: GameRound) -> Vec<PhaseEffect> {
        let mut effects = Vec::new();
        let round_id = round.round_id;
        let status = round.status.clone();
        let remaining = round.remaining_seconds;
        let winning_number = round.winning_number;

        if self.latest_round.is_some_and(|latest| round_id < latest) {
            warn!(round_id, status = %status, "dropping snapshot from an earlier round");
            return effects;
        }
        let new_round = self.latest_round != Some(round_id);
        if new_round {
            self.latest_round = Some(round_id);
            self.dispatched.clear();
        }

        // Snapshots replace each other wholesale
        self.current = Some(round);

        if !status.is_known() {
            warn!(round_id, status = %status, "ignoring unknown round status");
            return effects;
        }

        if status == GameStatus::BettingOpen
            && (1..=COUNTDOWN_TICK_FROM).contains(&remaining)
            && self.last_countdown != Some((round_id, remaining))
        {
            self.last_countdown = Some((round_id, remaining));
            effects.push(PhaseEffect::CountdownTick { remaining });
        }

        if self.dispatched.contains(&status) {
            debug!(round_id, status = %status, "status already dispatched this round");
            return effects;
        }
        info!(round_id, status = %status, "round phase edge");

        // A result status without a number stays open for a later snapshot
        let dispatches = winning_number.is_some()
            || !matches!(status, GameStatus::Finished | GameStatus::Settled);

        match status {
            GameStatus::BettingOpen => {
                if new_round {
                    effects.push(PhaseEffect::NewRound { round_id });
                }
                effects.push(PhaseEffect::HaltSpin);
            }
            GameStatus::BettingClosed => {
                effects.push(PhaseEffect::FreezeLedger { round_id });
                effects.push(PhaseEffect::BettingClosedTick);
            }
            GameStatus::Spinning => effects.push(PhaseEffect::StartSpin),
            GameStatus::Finished => match winning_number {
                Some(winning_number) => {
                    effects.push(PhaseEffect::StartSettle { winning_number });
                    effects.push(PhaseEffect::Estimate {
                        round_id,
                        winning_number,
                    });
                }
                None => debug!(round_id, "finished without a winning number"),
            },
            GameStatus::Settled => {
                if let Some(winning_number) = winning_number {
                    effects.push(PhaseEffect::Estimate {
                        round_id,
                        winning_number,
                    });
                }
            }
            GameStatus::Unknown(_) => {}
        }

        if dispatches {
            self.dispatched.insert(status.clone());
        }
        self.last_edge = Some((round_id, status));
        effects
    }
}
