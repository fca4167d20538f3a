//! Fibonacci staking: walk up the sequence on losses, back two on wins.

use rust_decimal::Decimal;
use strategy_core::{StakeDecision, StakePolicy};

/// n-th Fibonacci number (1-indexed): 1, 1, 2, 3, 5, ...
fn fib(n: u32) -> u64 {
    let mut pair = (1u64, 1u64);
    for _ in 2..n {
        pair = (pair.1, pair.0 + pair.1);
    }
    if n <= 1 {
        1
    } else {
        pair.1
    }
}

/// Fibonacci progression over a base stake.
///
/// Losses advance one position, wins retreat two (ending the series when
/// the walk returns to the start), pushes hold position. Undetermined
/// results follow the `unknown_is_loss` flag.
pub struct FibonacciPolicy {
    base: Decimal,
    max_steps: u32,
    unknown_is_loss: bool,
    position: u32,
}

impl FibonacciPolicy {
    pub fn new(base: Decimal, max_steps: u32, unknown_is_loss: bool) -> Self {
        Self {
            base,
            max_steps,
            unknown_is_loss,
            position: 1,
        }
    }

    fn stake_at(&self, position: u32) -> Decimal {
        self.base * Decimal::from(fib(position))
    }

    fn on_loss(&mut self) -> StakeDecision {
        self.position += 1;
        if self.position > self.max_steps {
            StakeDecision::Finished
        } else {
            StakeDecision::Stake(self.stake_at(self.position))
        }
    }

    fn on_win(&mut self) -> StakeDecision {
        if self.position <= 2 {
            return StakeDecision::Finished;
        }
        self.position -= 2;
        StakeDecision::Stake(self.stake_at(self.position))
    }
}

impl StakePolicy for FibonacciPolicy {
    fn label(&self) -> &str {
        "fibonacci"
    }

    fn opening_stake(&mut self) -> StakeDecision {
        self.position = 1;
        StakeDecision::Stake(self.stake_at(1))
    }

    fn after_result(&mut self, profit: Option<Decimal>) -> StakeDecision {
        match profit {
            Some(p) if p > Decimal::ZERO => self.on_win(),
            Some(p) if p == Decimal::ZERO => StakeDecision::Stake(self.stake_at(self.position)),
            Some(_) => self.on_loss(),
            None if self.unknown_is_loss => self.on_loss(),
            None => StakeDecision::Stake(self.stake_at(self.position)),
        }
    }
}
