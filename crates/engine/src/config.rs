//! Engine and strategy configuration.

use std::time::Duration;

use model::{timeframe_minutes, SignalKey, TradeKind, ANY};
use rust_decimal::Decimal;
use strategy_core::StrategyError;

/// Process-wide engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on concurrently open trades across all strategies.
    pub max_open_trades: u32,
    /// Cap on concurrently running settlement checks.
    pub max_result_checks: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_open_trades: 5,
            max_result_checks: 16,
        }
    }
}

/// Per-bot strategy settings.
///
/// `symbol` and `timeframe` accept the `"*"` wildcard, binding the strategy
/// to every concrete pair the signal source produces.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Bot name used in logs.
    pub name: String,
    pub symbol: String,
    pub timeframe: String,
    pub trade_kind: TradeKind,
    /// Sprint expiry in minutes. `None` derives it from the timeframe.
    pub expiry_minutes: Option<u32>,
    /// Account currency the stakes are denominated in.
    pub currency: String,
    /// Refuse trades that would take the balance below this floor.
    pub min_balance: Decimal,
    /// Refuse trades while the payout percent is below this floor.
    pub min_payout_percent: u32,
    /// Pause between payout re-checks while below the floor.
    pub low_payout_wait: Duration,
    /// TTL of cached payout quotes.
    pub payout_ttl: Duration,
    /// Initial wait before the settlement poll starts.
    pub result_wait: Duration,
    /// Slack past the expected next candle before the delay diagnostic.
    pub grace_delay: Duration,
    /// Give up waiting for a signal after this long. `None` waits forever.
    pub signal_timeout: Option<Duration>,
    /// When false, the process-wide trade lock serializes all execution.
    pub allow_parallel_trades: bool,
    /// Allow several concurrent execution tasks on one trade key.
    pub concurrent_trades_per_key: bool,
    /// Placement attempts on transport failure (business rejections are
    /// never retried).
    pub placement_attempts: u32,
    pub sprint_max_age: Duration,
    pub classic_max_age: Duration,
    /// Minimum remaining lead before the classic expiry boundary.
    pub classic_min_lead: Duration,
}

impl StrategyConfig {
    pub fn new(
        name: impl Into<String>,
        symbol: impl AsRef<str>,
        timeframe: impl AsRef<str>,
        trade_kind: TradeKind,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.as_ref().trim().to_uppercase(),
            timeframe: timeframe.as_ref().trim().to_uppercase(),
            trade_kind,
            expiry_minutes: None,
            currency: "USD".to_string(),
            min_balance: Decimal::from(100),
            min_payout_percent: 70,
            low_payout_wait: Duration::from_secs(1),
            payout_ttl: Duration::from_secs(1),
            result_wait: Duration::from_secs(60),
            grace_delay: Duration::from_secs(30),
            signal_timeout: None,
            allow_parallel_trades: true,
            concurrent_trades_per_key: false,
            placement_attempts: 4,
            sprint_max_age: Duration::from_secs(5),
            classic_max_age: Duration::from_secs(120),
            classic_min_lead: Duration::from_secs(10),
        }
    }

    pub fn uses_any_symbol(&self) -> bool {
        self.symbol == ANY
    }

    pub fn uses_any_timeframe(&self) -> bool {
        self.timeframe == ANY
    }

    /// Key this strategy listens on.
    pub fn signal_key(&self) -> SignalKey {
        SignalKey::new(&self.symbol, &self.timeframe)
    }

    /// Expiry minutes for a concrete timeframe, falling back to the
    /// timeframe duration and then to one minute.
    pub fn expiry_minutes_for(&self, timeframe: &str) -> u32 {
        self.expiry_minutes
            .or_else(|| timeframe_minutes(timeframe))
            .unwrap_or(1)
    }

    /// Maximum usable signal age for a trade with the given expiry.
    ///
    /// With parallel trades enabled a signal may legitimately sit buffered
    /// behind an open trade for a full expiry window, so the base window
    /// widens to cover it.
    pub fn max_signal_age(&self, expiry_minutes: u32) -> Duration {
        let base = match self.trade_kind {
            TradeKind::Sprint => self.sprint_max_age,
            TradeKind::Classic => self.classic_max_age,
        };
        if !self.allow_parallel_trades {
            return base;
        }
        let expiry = Duration::from_secs(u64::from(expiry_minutes) * 60);
        let window = self.result_wait.max(expiry) + Duration::from_secs(5);
        base.max(window)
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.symbol.is_empty() {
            return Err(StrategyError::InvalidConfig("symbol is empty".into()));
        }
        if self.timeframe.is_empty() {
            return Err(StrategyError::InvalidConfig("timeframe is empty".into()));
        }
        if !self.uses_any_timeframe() && timeframe_minutes(&self.timeframe).is_none() {
            return Err(StrategyError::InvalidConfig(format!(
                "unparseable timeframe '{}'",
                self.timeframe
            )));
        }
        if self.min_payout_percent > 100 {
            return Err(StrategyError::InvalidConfig(format!(
                "payout floor {}% exceeds 100%",
                self.min_payout_percent
            )));
        }
        if self.placement_attempts == 0 {
            return Err(StrategyError::InvalidConfig(
                "placement_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
