//! Pluggable stake policies.
//!
//! The engine runs the placement/settlement cycle; a policy decides the
//! stake of every trade in a series and when the series ends. Settlement
//! outcomes reach the policy exactly as the venue reported them — an
//! undetermined result is `None`, and whether that counts as a loss is a
//! policy decision, not an engine one.

use rust_decimal::Decimal;
use uuid::Uuid;

/// What the policy wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeDecision {
    /// Place another trade with this stake.
    Stake(Decimal),
    /// The series is complete; stop trading this signal.
    Finished,
}

/// A staking scheme for one trade series.
///
/// One policy instance drives one series: `opening_stake` is consulted
/// once, then `after_result` once per settled trade.
pub trait StakePolicy: Send {
    /// Short name used in series labels and logs, e.g. "martingale".
    fn label(&self) -> &str;

    /// Stake of the first trade of the series.
    fn opening_stake(&mut self) -> StakeDecision;

    /// Decide the next step given the signed profit of the last trade.
    /// `None` means the outcome could not be determined.
    fn after_result(&mut self, profit: Option<Decimal>) -> StakeDecision;
}

/// A boxed stake policy trait object.
pub type BoxedStakePolicy = Box<dyn StakePolicy>;

/// Generate a unique series label with a policy prefix.
///
/// Format: `{prefix}_{uuid}` where uuid is a v4 UUID in simple format.
pub fn generate_series_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().as_simple())
}
