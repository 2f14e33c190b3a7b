//! Provisional settlement
//!
//! Recomputes the player's result locally from the frozen ledger and the
//! winning number so that win/lose feedback can play before the server's
//! balance update arrives. The estimate is advisory: it never writes back
//! into balance or ledger state and is never reconciled with the server.

pub mod coverage;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::feedback::FeedbackService;
use crate::protocol::{RoundId, Wager};

pub use coverage::Coverage;

/// Estimated payout of one wager (stake included), zero when it loses
pub fn wager_payout(wager: &Wager, winning_number: u8) -> Decimal {
    match Coverage::parse(wager.bet_type, &wager.bet_value) {
        Some(coverage) if coverage.covers(winning_number) => {
            wager.amount * Decimal::from(wager.bet_type.multiplier())
        }
        Some(_) => Decimal::ZERO,
        None => {
            debug!(
                wager_id = wager.id,
                bet_type = %wager.bet_type,
                bet_value = %wager.bet_value,
                "wager value covers nothing"
            );
            Decimal::ZERO
        }
    }
}

/// Result of a provisional settlement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SettlementEstimate {
    pub total_wagered: Decimal,
    pub total_estimated_payout: Decimal,
    pub net_result: Decimal,
}

impl SettlementEstimate {
    /// Feedback to play; `None` for a round without wagers
    pub fn verdict(&self) -> Option<Verdict> {
        if self.total_wagered.is_zero() {
            return None;
        }
        Some(if self.net_result > Decimal::ZERO {
            Verdict::Celebrate {
                amount: self.total_estimated_payout,
            }
        } else {
            Verdict::Commiserate {
                amount: self.total_wagered,
            }
        })
    }
}

/// Estimate the outcome of `wagers` for `winning_number`
pub fn estimate(wagers: &[Wager], winning_number: u8) -> SettlementEstimate {
    let total_wagered: Decimal = wagers.iter().map(|w| w.amount).sum();
    let total_estimated_payout: Decimal = wagers
        .iter()
        .map(|w| wager_payout(w, winning_number))
        .sum();
    SettlementEstimate {
        total_wagered,
        total_estimated_payout,
        net_result: total_estimated_payout - total_wagered,
    }
}

/// Which feedback sequence to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Verdict {
    /// Estimated win; amount is the total estimated payout
    Celebrate { amount: Decimal },
    /// Estimated loss; amount is the total staked
    Commiserate { amount: Decimal },
}

/// A completed estimate for one round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateOutcome {
    pub round_id: RoundId,
    pub winning_number: u8,
    pub estimate: SettlementEstimate,
    pub verdict: Option<Verdict>,
}

/// Runs the estimate at most once per round and plays the verdict
///
/// Round ids only grow, so the guard is the highest round estimated so far:
/// a late snapshot for that round or any earlier one is refused.
pub struct SettlementEstimator {
    feedback: Arc<dyn FeedbackService>,
    last_round: Option<RoundId>,
}

impl SettlementEstimator {
    pub fn new(feedback: Arc<dyn FeedbackService>) -> Self {
        Self {
            feedback,
            last_round: None,
        }
    }

    /// Whether `round_id` was estimated already or is older than one that was
    pub fn has_run_for(&self, round_id: RoundId) -> bool {
        self.last_round.is_some_and(|last| round_id <= last)
    }

    /// Estimate `round_id` unless it has already been estimated
    ///
    /// `wagers` is the ledger frozen for this round, if any.
    pub fn estimate_once(
        &mut self,
        round_id: RoundId,
        wagers: Option<&[Wager]>,
        winning_number: u8,
    ) -> Option<EstimateOutcome> {
        if self.has_run_for(round_id) {
            debug!(round_id, "estimate already ran");
            return None;
        }
        self.last_round = Some(round_id);

        let estimate = estimate(wagers.unwrap_or_default(), winning_number);
        let verdict = estimate.verdict();
        info!(
            round_id,
            winning_number,
            wagered = %estimate.total_wagered,
            payout = %estimate.total_estimated_payout,
            net = %estimate.net_result,
            "provisional settlement"
        );
        Some(EstimateOutcome {
            round_id,
            winning_number,
            estimate,
            verdict,
        })
    }

    /// Play the feedback sequence for a verdict
    pub fn deliver(&self, verdict: Verdict) {
        match verdict {
            Verdict::Celebrate { amount } => self.feedback.play_win(amount),
            Verdict::Commiserate { amount } => self.feedback.play_lose(amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{FeedbackCue, RecordingFeedback};
    use crate::protocol::BetType;
    use rust_decimal_macros::dec;

    fn wager(bet_type: BetType, value: &str, amount: Decimal) -> Wager {
        Wager {
            id: 1,
            round_id: 1,
            bet_type,
            bet_value: value.to_string(),
            amount,
            potential_payout: amount * Decimal::from(bet_type.multiplier()),
            multiplier: Decimal::from(bet_type.multiplier()),
            settled: false,
            win_amount: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_straight_payout() {
        let wagers = [wager(BetType::Straight, "17", dec!(10))];
        assert_eq!(estimate(&wagers, 17).total_estimated_payout, dec!(360));
        assert_eq!(estimate(&wagers, 18).total_estimated_payout, dec!(0));
    }

    #[test]
    fn test_mixed_outside_bets_lose_overall() {
        let wagers = [
            wager(BetType::Color, "RED", dec!(20)),
            wager(BetType::Parity, "EVEN", dec!(15)),
        ];
        let result = estimate(&wagers, 10);
        assert_eq!(result.total_estimated_payout, dec!(30));
        assert_eq!(result.total_wagered, dec!(35));
        assert_eq!(result.net_result, dec!(-5));
        assert_eq!(
            result.verdict(),
            Some(Verdict::Commiserate { amount: dec!(35) })
        );
    }

    #[test]
    fn test_zero_only_pays_straight_zero() {
        let wagers = [
            wager(BetType::Color, "BLACK", dec!(5)),
            wager(BetType::Parity, "EVEN", dec!(5)),
            wager(BetType::Half, "LOW", dec!(5)),
            wager(BetType::Dozen, "1ST", dec!(5)),
            wager(BetType::Column, "3", dec!(5)),
            wager(BetType::Straight, "0", dec!(1)),
        ];
        let result = estimate(&wagers, 0);
        assert_eq!(result.total_estimated_payout, dec!(36));
        assert_eq!(result.verdict(), Some(Verdict::Celebrate { amount: dec!(36) }));
    }

    #[test]
    fn test_break_even_is_a_loss() {
        let wagers = [
            wager(BetType::Color, "RED", dec!(10)),
            wager(BetType::Color, "BLACK", dec!(10)),
        ];
        let result = estimate(&wagers, 1);
        assert_eq!(result.net_result, dec!(0));
        assert_eq!(
            result.verdict(),
            Some(Verdict::Commiserate { amount: dec!(20) })
        );
    }

    #[test]
    fn test_no_wagers_no_verdict() {
        assert_eq!(estimate(&[], 7).verdict(), None);
    }

    #[test]
    fn test_estimator_runs_once_per_round() {
        let recorder = Arc::new(RecordingFeedback::new());
        let mut estimator = SettlementEstimator::new(recorder.clone());
        let wagers = [wager(BetType::Straight, "17", dec!(10))];

        for _ in 0..2 {
            if let Some(outcome) = estimator.estimate_once(1, Some(&wagers), 17) {
                if let Some(verdict) = outcome.verdict {
                    estimator.deliver(verdict);
                }
            }
        }
        assert_eq!(recorder.verdicts(), vec![FeedbackCue::Win(dec!(360))]);
        assert!(estimator.estimate_once(2, Some(&wagers), 17).is_some());
    }

    #[test]
    fn test_earlier_round_refused_after_later_one() {
        let mut estimator = SettlementEstimator::new(Arc::new(RecordingFeedback::new()));
        let wagers = [wager(BetType::Straight, "17", dec!(10))];

        assert!(estimator.estimate_once(5, Some(&wagers), 17).is_some());
        assert!(estimator.has_run_for(3));
        assert!(estimator.estimate_once(3, Some(&wagers), 17).is_none());
        assert!(estimator.estimate_once(5, Some(&wagers), 17).is_none());
        assert!(!estimator.has_run_for(6));
    }

    #[test]
    fn test_missing_ledger_estimates_nothing() {
        let mut estimator = SettlementEstimator::new(Arc::new(RecordingFeedback::new()));
        let outcome = estimator.estimate_once(4, None, 12).unwrap();
        assert_eq!(outcome.estimate, SettlementEstimate::default());
        assert_eq!(outcome.verdict, None);
        assert!(estimator.has_run_for(4));
    }
}
