use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe metrics collector for the trade engine.
#[derive(Debug)]
pub struct EngineMetrics {
    // Counters
    signals_received: AtomicU64,
    signals_dropped_stale: AtomicU64,
    signals_deferred: AtomicU64,
    trades_placed: AtomicU64,
    placement_failures: AtomicU64,
    trades_won: AtomicU64,
    trades_lost: AtomicU64,
    trades_unknown: AtomicU64,
    feed_reconnects: AtomicU64,
    feed_errors: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_signal_time: Option<Instant>,
    last_trade_time: Option<Instant>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            signals_received: AtomicU64::new(0),
            signals_dropped_stale: AtomicU64::new(0),
            signals_deferred: AtomicU64::new(0),
            trades_placed: AtomicU64::new(0),
            placement_failures: AtomicU64::new(0),
            trades_won: AtomicU64::new(0),
            trades_lost: AtomicU64::new(0),
            trades_unknown: AtomicU64::new(0),
            feed_reconnects: AtomicU64::new(0),
            feed_errors: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_signal_time: None,
                last_trade_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_signals_received(&self) {
        self.signals_received.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_signal_time = Some(Instant::now());
    }

    pub fn inc_signals_dropped_stale(&self) {
        self.signals_dropped_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_signals_deferred(&self) {
        self.signals_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_placed(&self) {
        self.trades_placed.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_trade_time = Some(Instant::now());
    }

    pub fn inc_placement_failures(&self) {
        self.placement_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_won(&self) {
        self.trades_won.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_lost(&self) {
        self.trades_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_unknown(&self) {
        self.trades_unknown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_feed_reconnects(&self) {
        self.feed_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_feed_errors(&self) {
        self.feed_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Capture a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read();
        let uptime = inner.start_time.elapsed();
        let signals_received = self.signals_received.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime_secs: uptime.as_secs(),
            signals_received,
            signals_dropped_stale: self.signals_dropped_stale.load(Ordering::Relaxed),
            signals_deferred: self.signals_deferred.load(Ordering::Relaxed),
            trades_placed: self.trades_placed.load(Ordering::Relaxed),
            placement_failures: self.placement_failures.load(Ordering::Relaxed),
            trades_won: self.trades_won.load(Ordering::Relaxed),
            trades_lost: self.trades_lost.load(Ordering::Relaxed),
            trades_unknown: self.trades_unknown.load(Ordering::Relaxed),
            feed_reconnects: self.feed_reconnects.load(Ordering::Relaxed),
            feed_errors: self.feed_errors.load(Ordering::Relaxed),
            secs_since_last_signal: inner.last_signal_time.map(|t| t.elapsed().as_secs()),
            secs_since_last_trade: inner.last_trade_time.map(|t| t.elapsed().as_secs()),
        }
    }
}

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub signals_received: u64,
    pub signals_dropped_stale: u64,
    pub signals_deferred: u64,
    pub trades_placed: u64,
    pub placement_failures: u64,
    pub trades_won: u64,
    pub trades_lost: u64,
    pub trades_unknown: u64,
    pub feed_reconnects: u64,
    pub feed_errors: u64,
    pub secs_since_last_signal: Option<u64>,
    pub secs_since_last_trade: Option<u64>,
}

impl MetricsSnapshot {
    /// Settled trades, regardless of outcome.
    pub fn trades_settled(&self) -> u64 {
        self.trades_won + self.trades_lost + self.trades_unknown
    }

    /// Win rate over decided trades (wins / (wins + losses)).
    pub fn win_rate(&self) -> Option<f64> {
        let decided = self.trades_won + self.trades_lost;
        if decided == 0 {
            return None;
        }
        Some(self.trades_won as f64 / decided as f64)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Engine metrics (uptime {}s):", self.uptime_secs)?;
        writeln!(
            f,
            "  signals: {} received, {} stale-dropped, {} deferred",
            self.signals_received, self.signals_dropped_stale, self.signals_deferred
        )?;
        writeln!(
            f,
            "  trades: {} placed, {} placement failures",
            self.trades_placed, self.placement_failures
        )?;
        writeln!(
            f,
            "  results: {} won, {} lost, {} unknown",
            self.trades_won, self.trades_lost, self.trades_unknown
        )?;
        write!(
            f,
            "  feed: {} reconnects, {} errors",
            self.feed_reconnects, self.feed_errors
        )
    }
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<EngineMetrics>;

/// Create a new shared metrics collector.
pub fn create_metrics() -> SharedMetrics {
    Arc::new(EngineMetrics::new())
}
