//! The bus itself: key registry, push fan-out, versioned waits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use model::{epoch_ms, Signal, SignalKey};
use tracing::debug;

use crate::state::{KeyState, SignalEvent, SignalSnapshot, WaitOptions, WaitTimeout};

/// Per-key versioned pub/sub of directional signals.
///
/// Key states are created lazily and live for the life of the bus.
#[derive(Debug, Default)]
pub struct SignalBus {
    states: DashMap<SignalKey, Arc<KeyState>>,
}

/// Shared handle to the signal bus.
pub type SharedSignalBus = Arc<SignalBus>;

/// Create a new shared signal bus.
pub fn create_signal_bus() -> SharedSignalBus {
    Arc::new(SignalBus::new())
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_for(&self, key: &SignalKey) -> Arc<KeyState> {
        self.states
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Publish a signal.
    ///
    /// Fans out to the exact key and all matching wildcard keys. Every push
    /// bumps the version and wakes waiters, even when `direction` is `None`
    /// (a clear); only usable directions are recorded in history.
    pub fn push(&self, signal: &Signal) {
        let arrived_at = Instant::now();
        let key = SignalKey::new(&signal.symbol, &signal.timeframe);
        for fanned in key.fanout() {
            self.state_for(&fanned).apply(signal, arrived_at);
        }
    }

    /// Publish a signal unless its candle is already older than `max_age`.
    ///
    /// Returns whether the signal was published. Signals without a candle
    /// timestamp are always published.
    pub fn push_if_fresh(&self, signal: &Signal, max_age: Duration) -> bool {
        if let Some(candle_ts) = signal.candle_ts_ms {
            let age_ms = epoch_ms().saturating_sub(candle_ts);
            if age_ms > max_age.as_millis() as i64 {
                debug!(
                    symbol = %signal.symbol,
                    timeframe = %signal.timeframe,
                    age_ms,
                    "dropping stale signal push"
                );
                return false;
            }
        }
        self.push(signal);
        true
    }

    /// Non-blocking snapshot of a key's current state.
    pub fn peek(&self, key: &SignalKey) -> SignalSnapshot {
        self.state_for(key).inner.lock().snapshot()
    }

    /// Current version of a key (0 if nothing was ever pushed).
    pub fn version(&self, key: &SignalKey) -> u64 {
        self.peek(key).version
    }

    /// Wait for a usable signal with `version > since_version` that arrived
    /// no earlier than `max_age` before the call.
    ///
    /// On timeout, returns [`WaitTimeout`] without consuming a version; the
    /// caller may wait again with the same options.
    pub async fn wait_for_versioned(
        &self,
        key: &SignalKey,
        opts: WaitOptions,
    ) -> Result<SignalEvent, WaitTimeout> {
        self.wait_for_versioned_with(key, opts, |_| {}).await
    }

    /// As [`wait_for_versioned`](Self::wait_for_versioned), additionally
    /// invoking `on_delay(drift)` once per overdue candle when more than
    /// `grace_delay` has elapsed past the expected next-candle time. The
    /// hook is diagnostic only.
    pub async fn wait_for_versioned_with<F>(
        &self,
        key: &SignalKey,
        opts: WaitOptions,
        mut on_delay: F,
    ) -> Result<SignalEvent, WaitTimeout>
    where
        F: FnMut(Duration) + Send,
    {
        let state = self.state_for(key);
        let started = Instant::now();
        // None: the process is younger than max_age, accept any arrival.
        let cutoff = started.checked_sub(opts.max_age);
        let mut reported_for: Option<Instant> = None;

        loop {
            // Arm the notification before inspecting state so a push
            // between the check and the await is never lost.
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (ready, deadline) = {
                let inner = state.inner.lock();
                (
                    inner.find_ready(opts.since_version, cutoff),
                    inner.delay_deadline(opts.grace_delay),
                )
            };

            if let Some(event) = ready {
                return Ok(event);
            }

            let delay_arm = match deadline {
                Some((due, arrival)) if reported_for != Some(arrival) => {
                    let now = Instant::now();
                    if now >= due {
                        // Drift measured from the expected next-candle time.
                        on_delay(now - due + opts.grace_delay);
                        reported_for = Some(arrival);
                        None
                    } else {
                        Some((due, arrival))
                    }
                }
                _ => None,
            };

            let timeout_left = match opts.timeout {
                Some(total) => match total.checked_sub(started.elapsed()) {
                    Some(left) => Some(left),
                    None => return Err(WaitTimeout),
                },
                None => None,
            };

            let timeout_sleep = async {
                match timeout_left {
                    Some(left) => tokio::time::sleep(left).await,
                    None => std::future::pending().await,
                }
            };
            let delay_sleep = async {
                match delay_arm {
                    Some((due, _)) => {
                        tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = timeout_sleep => return Err(WaitTimeout),
                // Woke up just to fire the delay diagnostic on the next pass.
                _ = delay_sleep => {}
            }
        }
    }
}
