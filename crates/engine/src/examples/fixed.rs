//! Fixed stake: one trade per signal, always the same amount.

use rust_decimal::Decimal;
use strategy_core::{StakeDecision, StakePolicy};

/// Places a single trade with a constant stake, then finishes the series.
pub struct FixedStakePolicy {
    stake: Decimal,
}

impl FixedStakePolicy {
    pub fn new(stake: Decimal) -> Self {
        Self { stake }
    }
}

impl StakePolicy for FixedStakePolicy {
    fn label(&self) -> &str {
        "fixed"
    }

    fn opening_stake(&mut self) -> StakeDecision {
        StakeDecision::Stake(self.stake)
    }

    fn after_result(&mut self, _profit: Option<Decimal>) -> StakeDecision {
        StakeDecision::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_one_trade_per_series() {
        let mut policy = FixedStakePolicy::new(dec!(100));

        assert_eq!(policy.opening_stake(), StakeDecision::Stake(dec!(100)));
        assert_eq!(policy.after_result(Some(dec!(85))), StakeDecision::Finished);
    }

    #[test]
    fn test_finishes_regardless_of_outcome() {
        let mut policy = FixedStakePolicy::new(dec!(100));
        policy.opening_stake();
        assert_eq!(policy.after_result(Some(dec!(-100))), StakeDecision::Finished);

        let mut policy = FixedStakePolicy::new(dec!(100));
        policy.opening_stake();
        assert_eq!(policy.after_result(None), StakeDecision::Finished);
    }
}
