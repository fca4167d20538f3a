//! Single-flight, TTL-bounded cache for payout-percent quotes.
//!
//! Payout quotes are served from an HTTP endpoint that is both slow and
//! rate-limited, while many strategies ask for the same quote at nearly the
//! same moment. This cache guarantees that for any key at most one fetch is
//! in flight; every concurrent caller awaits that same fetch. Results —
//! including failures — are cached with a fresh timestamp, so a flaky
//! upstream is not hammered until the TTL expires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use model::TradeKind;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::debug;

/// Cache key: one payout quote per (symbol, expiry, currency, kind, stake).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayoutKey {
    pub symbol: String,
    pub minutes: u32,
    pub currency: String,
    pub kind: TradeKind,
    pub stake: Decimal,
}

impl PayoutKey {
    pub fn new(
        symbol: impl AsRef<str>,
        minutes: u32,
        currency: impl AsRef<str>,
        kind: TradeKind,
        stake: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.as_ref().trim().to_uppercase(),
            minutes,
            currency: currency.as_ref().trim().to_uppercase(),
            kind,
            stake,
        }
    }
}

type InFlight = Shared<BoxFuture<'static, Option<u32>>>;

#[derive(Default)]
struct Entry {
    value: Option<u32>,
    fetched_at: Option<Instant>,
    in_flight: Option<InFlight>,
}

impl Entry {
    fn fresh_value(&self, ttl: Duration) -> Option<Option<u32>> {
        let fetched_at = self.fetched_at?;
        if fetched_at.elapsed() < ttl {
            Some(self.value)
        } else {
            None
        }
    }
}

/// Single-flight payout cache. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct PayoutCache {
    entries: Arc<Mutex<HashMap<PayoutKey, Entry>>>,
}

impl PayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached payout for `key` if fresher than `ttl`, otherwise
    /// fetch it — coalescing every concurrent caller for the same key onto
    /// a single invocation of `fetch`.
    ///
    /// A fetch that fails yields `None`, which is cached like any other
    /// result: callers arriving before the TTL expires observe the failure
    /// instead of retrying immediately.
    pub async fn get_or_fetch<F, Fut>(&self, key: PayoutKey, ttl: Duration, fetch: F) -> Option<u32>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Option<u32>> + Send + 'static,
    {
        let shared = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_default();

            if let Some(value) = entry.fresh_value(ttl) {
                return value;
            }

            match &entry.in_flight {
                Some(existing) => existing.clone(),
                None => {
                    debug!(symbol = %key.symbol, minutes = key.minutes, "payout cache miss, fetching");
                    let cache = self.clone();
                    let fetch_key = key.clone();
                    let future = fetch();
                    let shared: InFlight = async move {
                        let value = future.await;
                        cache.complete(&fetch_key, value);
                        value
                    }
                    .boxed()
                    .shared();
                    entry.in_flight = Some(shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    fn complete(&self, key: &PayoutKey, value: Option<u32>) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.value = value;
            entry.fetched_at = Some(Instant::now());
            entry.in_flight = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn make_key() -> PayoutKey {
        PayoutKey::new("EURUSD", 1, "USD", TradeKind::Sprint, dec!(100))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = PayoutCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(make_key(), Duration::from_secs(1), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Some(80)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(80));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_value_served_without_fetch() {
        let cache = PayoutCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_fetch(make_key(), Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(75)
                })
                .await;
            assert_eq!(value, Some(75));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetched() {
        let cache = PayoutCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .get_or_fetch(make_key(), Duration::from_millis(10), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(82)
                })
                .await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_cached_until_ttl() {
        let cache = PayoutCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_fetch(make_key(), Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    None
                })
                .await;
            assert_eq!(value, None);
        }

        // The failure is negative-cached, not retried per caller.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_independently() {
        let cache = PayoutCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        for minutes in [1, 5] {
            let calls = calls.clone();
            let key = PayoutKey::new("EURUSD", minutes, "USD", TradeKind::Sprint, dec!(100));
            cache
                .get_or_fetch(key, Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(80)
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
