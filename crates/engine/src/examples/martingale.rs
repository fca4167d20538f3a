//! Martingale: multiply the stake after every loss, stop on a win.

use rust_decimal::Decimal;
use strategy_core::{StakeDecision, StakePolicy};

/// Classic martingale progression.
///
/// Whether an undetermined result counts as a loss is configurable per
/// policy instance; the engine deliberately has no opinion.
pub struct MartingalePolicy {
    base: Decimal,
    coefficient: Decimal,
    max_steps: u32,
    unknown_is_loss: bool,
    step: u32,
    stake: Decimal,
}

impl MartingalePolicy {
    pub fn new(base: Decimal, coefficient: Decimal, max_steps: u32, unknown_is_loss: bool) -> Self {
        Self {
            base,
            coefficient,
            max_steps,
            unknown_is_loss,
            step: 0,
            stake: base,
        }
    }

    fn advance(&mut self) -> StakeDecision {
        self.step += 1;
        if self.step >= self.max_steps {
            StakeDecision::Finished
        } else {
            self.stake *= self.coefficient;
            StakeDecision::Stake(self.stake)
        }
    }
}

impl StakePolicy for MartingalePolicy {
    fn label(&self) -> &str {
        "martingale"
    }

    fn opening_stake(&mut self) -> StakeDecision {
        self.step = 0;
        self.stake = self.base;
        StakeDecision::Stake(self.stake)
    }

    fn after_result(&mut self, profit: Option<Decimal>) -> StakeDecision {
        match profit {
            // A win ends the series.
            Some(p) if p > Decimal::ZERO => StakeDecision::Finished,
            // A push repeats the step unchanged.
            Some(p) if p == Decimal::ZERO => StakeDecision::Stake(self.stake),
            Some(_) => self.advance(),
            None if self.unknown_is_loss => self.advance(),
            None => StakeDecision::Stake(self.stake),
        }
    }
}
