//! Core data types shared across the trading engine.
//!
//! This crate defines the vocabulary of the system:
//!
//! - **Signals**: `Signal`, `Direction`, `SignalKey` (with `"*"` wildcards)
//! - **Trades**: `TradeKey`, `TradeKind`, `TradeResult`, `AccountMode`
//! - **Timeframes**: parsing of `M1`/`H4`-style codes into minutes/seconds

mod signal;
mod timeframe;
mod trade;

pub use signal::{Direction, Signal, SignalKey, ANY};
pub use timeframe::{timeframe_minutes, timeframe_seconds};
pub use trade::{AccountMode, TradeKey, TradeKind, TradeResult};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
