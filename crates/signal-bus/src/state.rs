//! Per-key signal state: version counter, latest direction, bounded history.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use model::{timeframe_seconds, Direction, Signal};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Number of history entries retained per key for replay-with-cutoff.
const HISTORY_CAP: usize = 32;

/// Metadata snapshot attached to every usable signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMeta {
    /// Concrete symbol the signal was produced for (wildcard waiters need
    /// this to resolve their trade key).
    pub symbol: String,
    /// Concrete timeframe the signal was produced for.
    pub timeframe: String,
    pub indicator: Option<String>,
    pub tf_seconds: Option<u64>,
    pub candle_ts_ms: Option<i64>,
    pub next_candle_ts_ms: Option<i64>,
}

/// A signal delivered to a waiter.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub direction: Direction,
    pub version: u64,
    pub arrived_at: Instant,
    pub meta: SignalMeta,
}

/// Non-blocking view of a key's state, for display purposes.
#[derive(Debug, Clone)]
pub struct SignalSnapshot {
    pub version: u64,
    pub direction: Option<Direction>,
    pub indicator: Option<String>,
    pub tf_seconds: Option<u64>,
    /// Time since the last push, if any push has been seen.
    pub last_age: Option<Duration>,
    pub next_candle_ts_ms: Option<i64>,
}

/// Parameters for a versioned wait.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Only entries with a strictly greater version qualify.
    pub since_version: Option<u64>,
    /// Give up after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Accept entries that arrived at most this long before the wait began.
    /// Zero means only pushes arriving after the call qualify.
    pub max_age: Duration,
    /// Slack past the expected next-candle time before the delay diagnostic
    /// fires.
    pub grace_delay: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            since_version: None,
            timeout: None,
            max_age: Duration::ZERO,
            grace_delay: Duration::from_secs(5),
        }
    }
}

/// The wait timed out before a qualifying signal arrived.
///
/// No version is consumed; the caller may simply wait again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out waiting for signal")]
pub struct WaitTimeout;

#[derive(Debug)]
struct HistoryEntry {
    direction: Direction,
    version: u64,
    arrived_at: Instant,
    meta: SignalMeta,
}

#[derive(Debug, Default)]
pub(crate) struct KeyStateInner {
    version: u64,
    latest: Option<Direction>,
    last_arrival: Option<Instant>,
    tf_seconds: Option<u64>,
    indicator: Option<String>,
    next_candle_ts_ms: Option<i64>,
    history: VecDeque<HistoryEntry>,
}

/// State for one signal key. Mutated only under its own lock; waiters are
/// woken through the paired `Notify`.
#[derive(Debug, Default)]
pub(crate) struct KeyState {
    pub(crate) inner: Mutex<KeyStateInner>,
    pub(crate) notify: Notify,
}

impl KeyState {
    /// Apply one push under the key lock, then wake all waiters.
    pub(crate) fn apply(&self, signal: &Signal, arrived_at: Instant) -> u64 {
        let version = {
            let mut inner = self.inner.lock();
            inner.version += 1;
            inner.latest = signal.direction;
            inner.last_arrival = Some(arrived_at);
            if let Some(sec) = timeframe_seconds(&signal.timeframe) {
                inner.tf_seconds = Some(sec);
            }
            if signal.indicator.is_some() {
                inner.indicator = signal.indicator.clone();
            }
            inner.next_candle_ts_ms = signal.next_candle_ts_ms;

            if let Some(direction) = signal.direction {
                let meta = SignalMeta {
                    symbol: signal.symbol.to_uppercase(),
                    timeframe: signal.timeframe.to_uppercase(),
                    indicator: signal.indicator.clone(),
                    tf_seconds: timeframe_seconds(&signal.timeframe),
                    candle_ts_ms: signal.candle_ts_ms,
                    next_candle_ts_ms: signal.next_candle_ts_ms,
                };
                let entry_version = inner.version;
                inner.history.push_back(HistoryEntry {
                    direction,
                    version: entry_version,
                    arrived_at,
                    meta,
                });
                while inner.history.len() > HISTORY_CAP {
                    inner.history.pop_front();
                }
            }
            inner.version
        };
        self.notify.notify_waiters();
        version
    }
}

impl KeyStateInner {
    /// Oldest history entry newer than `since_version` that arrived at or
    /// after `cutoff`. `cutoff = None` accepts any arrival time.
    pub(crate) fn find_ready(
        &self,
        since_version: Option<u64>,
        cutoff: Option<Instant>,
    ) -> Option<SignalEvent> {
        self.history
            .iter()
            .find(|entry| {
                since_version.map_or(true, |since| entry.version > since)
                    && cutoff.map_or(true, |cut| entry.arrived_at >= cut)
            })
            .map(|entry| SignalEvent {
                direction: entry.direction,
                version: entry.version,
                arrived_at: entry.arrived_at,
                meta: entry.meta.clone(),
            })
    }

    /// Instant at which the next candle's signal counts as overdue, when
    /// both the last arrival and the timeframe duration are known.
    pub(crate) fn delay_deadline(&self, grace: Duration) -> Option<(Instant, Instant)> {
        let last = self.last_arrival?;
        let tf = Duration::from_secs(self.tf_seconds?);
        let expected_next = last + tf;
        Some((expected_next + grace, last))
    }

    pub(crate) fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            version: self.version,
            direction: self.latest,
            indicator: self.indicator.clone(),
            tf_seconds: self.tf_seconds,
            last_age: self.last_arrival.map(|at| at.elapsed()),
            next_candle_ts_ms: self.next_candle_ts_ms,
        }
    }
}
