//! Signal validity predicates.
//!
//! Sprint and classic trades have different freshness rules: a sprint
//! signal is worthless seconds after the candle it predicts, while a
//! classic signal stays actionable until shortly before the next candle
//! boundary it expires on.

use std::fmt;
use std::time::Instant;

use model::epoch_ms;

use crate::config::StrategyConfig;

/// Why a signal was rejected. Staleness is a silent skip, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The signal is older than the freshness window.
    TooOld { age_secs: u64, max_secs: u64 },
    /// A classic trade needs a next-candle expiry anchor the signal lacks.
    MissingExpiry,
    /// Not enough lead time remains before the classic expiry boundary.
    ExpiryTooClose { lead_ms: i64 },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooOld { age_secs, max_secs } => {
                write!(f, "signal is {age_secs}s old (limit {max_secs}s)")
            }
            Self::MissingExpiry => write!(f, "no expiry anchor for classic trade"),
            Self::ExpiryTooClose { lead_ms } => {
                write!(f, "only {lead_ms}ms left before expiry boundary")
            }
        }
    }
}

/// Validate a signal against the strategy's freshness rules.
///
/// `arrived_at` is the monotonic arrival time of the signal;
/// `next_candle_ts_ms` its classic expiry anchor. The age window must be
/// computed by the caller via [`StrategyConfig::max_signal_age`] since it
/// depends on the resolved expiry.
pub fn check_signal(
    cfg: &StrategyConfig,
    arrived_at: Instant,
    next_candle_ts_ms: Option<i64>,
    max_age: std::time::Duration,
) -> Result<(), StaleReason> {
    let age = arrived_at.elapsed();
    if age > max_age {
        return Err(StaleReason::TooOld {
            age_secs: age.as_secs(),
            max_secs: max_age.as_secs(),
        });
    }

    if cfg.trade_kind == model::TradeKind::Classic {
        let Some(end_ts_ms) = next_candle_ts_ms else {
            return Err(StaleReason::MissingExpiry);
        };
        let lead_ms = end_ts_ms - epoch_ms();
        if lead_ms < cfg.classic_min_lead.as_millis() as i64 {
            return Err(StaleReason::ExpiryTooClose { lead_ms });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::TradeKind;
    use std::time::Duration;

    fn sprint_config() -> StrategyConfig {
        StrategyConfig::new("bot", "EURUSD", "M1", TradeKind::Sprint)
    }

    fn classic_config() -> StrategyConfig {
        StrategyConfig::new("bot", "EURUSD", "M5", TradeKind::Classic)
    }

    #[test]
    fn test_fresh_sprint_signal_passes() {
        let cfg = sprint_config();
        let result = check_signal(&cfg, Instant::now(), None, Duration::from_secs(5));
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_old_sprint_signal_rejected() {
        let cfg = sprint_config();
        let arrived = Instant::now() - Duration::from_secs(10);
        let result = check_signal(&cfg, arrived, None, Duration::from_secs(5));
        assert!(matches!(result, Err(StaleReason::TooOld { .. })));
    }

    #[test]
    fn test_classic_needs_expiry_anchor() {
        let cfg = classic_config();
        let result = check_signal(&cfg, Instant::now(), None, Duration::from_secs(120));
        assert_eq!(result, Err(StaleReason::MissingExpiry));
    }

    #[test]
    fn test_classic_rejects_imminent_expiry() {
        let cfg = classic_config();
        let end = epoch_ms() + 2_000; // 2s lead, 10s required
        let result = check_signal(&cfg, Instant::now(), Some(end), Duration::from_secs(120));
        assert!(matches!(result, Err(StaleReason::ExpiryTooClose { .. })));
    }

    #[test]
    fn test_classic_with_ample_lead_passes() {
        let cfg = classic_config();
        let end = epoch_ms() + 60_000;
        let result = check_signal(&cfg, Instant::now(), Some(end), Duration::from_secs(120));
        assert_eq!(result, Ok(()));
    }
}
