//! Venue trading rules: stake limits and permitted expiries.

use rust_decimal::Decimal;

/// Timeframes the venue accepts for classic (candle-boundary) expiries.
pub const CLASSIC_ALLOWED_TFS: [&str; 5] = ["M5", "M15", "M30", "H1", "H4"];

/// Stake limits per account currency.
const STAKE_LIMITS: [(&str, i64, i64); 2] = [("RUB", 100, 50_000), ("USD", 1, 700)];

const DEFAULT_ACCOUNT_CCY: &str = "RUB";

/// (min, max) stake for an account currency. Unknown currencies fall back
/// to the default currency's limits.
pub fn stake_range(account_ccy: &str) -> (Decimal, Decimal) {
    let ccy = account_ccy.trim().to_uppercase();
    let (_, lo, hi) = STAKE_LIMITS
        .iter()
        .find(|(name, _, _)| *name == ccy)
        .or_else(|| STAKE_LIMITS.iter().find(|(name, _, _)| *name == DEFAULT_ACCOUNT_CCY))
        .copied()
        .unwrap_or(("RUB", 100, 50_000));
    (Decimal::from(lo), Decimal::from(hi))
}

/// Clamp a stake into the currency's limits.
pub fn clamp_stake(account_ccy: &str, amount: Decimal) -> Decimal {
    let (lo, hi) = stake_range(account_ccy);
    amount.clamp(lo, hi)
}

/// Whether a stake is already within the currency's limits.
pub fn stake_in_range(account_ccy: &str, amount: Decimal) -> bool {
    clamp_stake(account_ccy, amount) == amount
}

/// Whether the venue accepts a sprint expiry of `minutes` for `symbol`.
///
/// BTCUSDT only trades 5–500 minute sprints; everything else accepts 1
/// minute or 3–500 minutes.
pub fn is_sprint_allowed(symbol: &str, minutes: u32) -> bool {
    if symbol.eq_ignore_ascii_case("BTCUSDT") {
        (5..=500).contains(&minutes)
    } else {
        minutes == 1 || (3..=500).contains(&minutes)
    }
}

/// Clamp `minutes` into 1–500 and return it if the venue permits it for
/// `symbol`, otherwise `None`.
pub fn normalize_sprint(symbol: &str, minutes: u32) -> Option<u32> {
    let m = minutes.clamp(1, 500);
    is_sprint_allowed(symbol, m).then_some(m)
}

/// Whether a timeframe is usable for classic expiries.
pub fn is_classic_timeframe(tf: &str) -> bool {
    let tf = tf.trim().to_uppercase();
    CLASSIC_ALLOWED_TFS.contains(&tf.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stake_range_known_currencies() {
        assert_eq!(stake_range("RUB"), (dec!(100), dec!(50000)));
        assert_eq!(stake_range("usd"), (dec!(1), dec!(700)));
    }

    #[test]
    fn test_stake_range_unknown_falls_back() {
        assert_eq!(stake_range("EUR"), (dec!(100), dec!(50000)));
    }

    #[test]
    fn test_clamp_stake() {
        assert_eq!(clamp_stake("USD", dec!(0.5)), dec!(1));
        assert_eq!(clamp_stake("USD", dec!(1000)), dec!(700));
        assert_eq!(clamp_stake("USD", dec!(50)), dec!(50));
    }

    #[test]
    fn test_stake_in_range() {
        assert!(stake_in_range("RUB", dec!(100)));
        assert!(!stake_in_range("RUB", dec!(99)));
        assert!(!stake_in_range("RUB", dec!(50001)));
    }

    #[test]
    fn test_sprint_minutes_default_symbol() {
        assert!(is_sprint_allowed("EURUSD", 1));
        assert!(!is_sprint_allowed("EURUSD", 2));
        assert!(is_sprint_allowed("EURUSD", 3));
        assert!(is_sprint_allowed("EURUSD", 500));
    }

    #[test]
    fn test_sprint_minutes_btcusdt() {
        assert!(!is_sprint_allowed("BTCUSDT", 1));
        assert!(!is_sprint_allowed("BTCUSDT", 4));
        assert!(is_sprint_allowed("BTCUSDT", 5));
        assert!(is_sprint_allowed("BTCUSDT", 500));
    }

    #[test]
    fn test_normalize_sprint() {
        assert_eq!(normalize_sprint("EURUSD", 1), Some(1));
        assert_eq!(normalize_sprint("EURUSD", 2), None);
        assert_eq!(normalize_sprint("EURUSD", 9999), Some(500));
        assert_eq!(normalize_sprint("BTCUSDT", 1), None);
        assert_eq!(normalize_sprint("BTCUSDT", 9999), Some(500));
    }

    #[test]
    fn test_classic_timeframes() {
        assert!(is_classic_timeframe("M5"));
        assert!(is_classic_timeframe("h4"));
        assert!(!is_classic_timeframe("M1"));
        assert!(!is_classic_timeframe("D1"));
    }
}
