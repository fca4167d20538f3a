//! Observer callbacks for the host application.
//!
//! Observers are fire-and-forget: the engine invokes them at well-defined
//! points and never lets their effects alter engine logic.

use std::sync::Arc;
use std::time::Duration;

use model::{AccountMode, Direction};
use rust_decimal::Decimal;

/// A trade was placed and awaits settlement.
#[derive(Debug, Clone)]
pub struct PendingTradeEvent {
    pub trade_id: String,
    pub symbol: String,
    pub timeframe: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub payout_percent: u32,
    /// Expected time until expiry.
    pub wait: Duration,
    /// Expected expiry timestamp (epoch ms).
    pub expected_end_ms: i64,
    pub account_mode: AccountMode,
    pub indicator: String,
    /// Series label, e.g. "martingale_3fa85f64...".
    pub series: String,
    pub signal_at_ms: i64,
    pub placed_at_ms: i64,
}

/// A trade reached a terminal settlement state.
#[derive(Debug, Clone)]
pub struct SettledTradeEvent {
    pub trade_id: String,
    pub symbol: String,
    pub timeframe: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub payout_percent: u32,
    /// Signed profit; `None` when the outcome stayed undetermined.
    pub profit: Option<Decimal>,
    pub account_mode: AccountMode,
    pub indicator: String,
    pub series: String,
}

/// Callbacks a host (UI, logger, recorder) can attach to a bot.
pub trait TradeObserver: Send + Sync {
    /// Phase change: "waiting for signal", "placing trade", "paused", ...
    fn on_status(&self, _status: &str) {}

    /// Free-form log line for the host's log panel.
    fn on_log(&self, _line: &str) {}

    fn on_trade_pending(&self, _event: &PendingTradeEvent) {}

    fn on_trade_result(&self, _event: &SettledTradeEvent) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl TradeObserver for NullObserver {}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn TradeObserver>;
