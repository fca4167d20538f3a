//! The generic placement/settlement cycle.
//!
//! One call to [`run_series`] drives one trade series for one signal: the
//! stake policy decides the stake of every step, the engine enforces the
//! freshness, payout and balance gates, places through the serialized
//! queue, and waits for settlement through the result-collection queue.
//! Every wait except the gateway's own HTTP calls races the stop signal.

use std::time::Duration;

use model::{epoch_ms, AccountMode, TradeKey, TradeKind, TradeResult};
use payout_cache::PayoutKey;
use rust_decimal::Decimal;
use signal_bus::SignalEvent;
use strategy_core::{
    generate_series_id, ControlToken, PendingTradeEvent, SettledTradeEvent, SharedObserver,
    StakeDecision, StakePolicy,
};
use gateway::{rules, PayoutQuote, TradeExpiry, TradeOrder};
use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::engine::SharedEngine;
use crate::error::EngineError;
use crate::validity::{self, StaleReason};

/// Pause between placement retries after a transport failure.
const PLACEMENT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// How a series ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SeriesOutcome {
    /// The stake policy declared the series finished.
    Completed,
    /// The series stopped early for the given reason.
    Aborted(String),
    /// The signal went stale before the first placement.
    Stale(StaleReason),
}

/// Summary of one executed series.
#[derive(Debug, Clone)]
pub(crate) struct SeriesReport {
    pub trades: u32,
    pub net: Decimal,
    pub outcome: SeriesOutcome,
}

impl SeriesReport {
    fn new() -> Self {
        Self {
            trades: 0,
            net: Decimal::ZERO,
            outcome: SeriesOutcome::Completed,
        }
    }

    fn aborted(mut self, reason: impl Into<String>) -> Self {
        self.outcome = SeriesOutcome::Aborted(reason.into());
        self
    }

    fn stale(mut self, reason: StaleReason) -> Self {
        self.outcome = SeriesOutcome::Stale(reason);
        self
    }
}

/// Run one trade series for `event` on `key`.
pub(crate) async fn run_series(
    engine: &SharedEngine,
    cfg: &StrategyConfig,
    control: &ControlToken,
    observer: &SharedObserver,
    key: &TradeKey,
    event: &SignalEvent,
    policy: &mut dyn StakePolicy,
) -> Result<SeriesReport, EngineError> {
    let series = generate_series_id(policy.label());
    let expiry_minutes = cfg.expiry_minutes_for(key.timeframe());
    let max_age = cfg.max_signal_age(expiry_minutes);
    let indicator = event.meta.indicator.clone().unwrap_or_else(|| "-".into());
    let signal_at_ms = event
        .meta
        .candle_ts_ms
        .unwrap_or_else(|| epoch_ms() - event.arrived_at.elapsed().as_millis() as i64);

    let mut report = SeriesReport::new();
    let mut step: u32 = 0;
    let mut low_payout_notified = false;
    let mut decision = policy.opening_stake();

    loop {
        let stake = match decision {
            StakeDecision::Stake(stake) => stake,
            StakeDecision::Finished => break,
        };

        control.pause_point().await.map_err(|_| EngineError::Cancelled)?;

        // Stake bounds are venue rules; a violation is a policy refusal
        // that ends the series, not a retryable condition.
        if !rules::stake_in_range(&cfg.currency, stake) {
            observer.on_log(&format!(
                "[{key}] stake {stake} {} outside venue limits, aborting series",
                cfg.currency
            ));
            observer.on_status("series aborted");
            return Ok(report.aborted("stake outside venue limits"));
        }

        // Freshness gates the first placement of a series; later steps are
        // continuations of an already-accepted signal.
        if step == 0 {
            if let Err(reason) =
                validity::check_signal(cfg, event.arrived_at, event.meta.next_candle_ts_ms, max_age)
            {
                debug!(key = %key, %reason, "signal stale before series start");
                engine.metrics().inc_signals_dropped_stale();
                observer.on_log(&format!("[{key}] skipping signal: {reason}"));
                return Ok(report.stale(reason));
            }
        }

        // Payout floor, then balance floor. Both sit between freshness
        // validation and placement.
        let payout = loop {
            control.pause_point().await.map_err(|_| EngineError::Cancelled)?;

            let cache_key = PayoutKey::new(
                key.symbol(),
                expiry_minutes,
                &cfg.currency,
                cfg.trade_kind,
                stake,
            );
            let quote = PayoutQuote {
                symbol: key.symbol().to_string(),
                stake,
                minutes: expiry_minutes,
                currency: cfg.currency.clone(),
                kind: cfg.trade_kind,
            };
            let gw = engine.gateway().clone();
            let fetched = engine.payouts().get_or_fetch(cache_key, cfg.payout_ttl, move || {
                async move { gw.payout_percent(&quote).await.ok().flatten() }
            });

            let pct = control
                .wait(fetched, None)
                .await
                .map_err(|_| EngineError::Cancelled)?;

            match pct {
                None => {
                    observer.on_status("waiting for payout");
                    observer.on_log(&format!("[{key}] no payout quote, skipping signal"));
                    return Ok(report.aborted("no payout quote"));
                }
                Some(pct) if pct < cfg.min_payout_percent => {
                    observer.on_status("waiting for higher payout");
                    if !low_payout_notified {
                        observer.on_log(&format!(
                            "[{key}] low payout {pct}% < {}%, waiting",
                            cfg.min_payout_percent
                        ));
                        low_payout_notified = true;
                    }
                    control
                        .sleep(cfg.low_payout_wait)
                        .await
                        .map_err(|_| EngineError::Cancelled)?;
                    // The wait may have outlived the signal.
                    if step == 0 {
                        if let Err(reason) = validity::check_signal(
                            cfg,
                            event.arrived_at,
                            event.meta.next_candle_ts_ms,
                            max_age,
                        ) {
                            engine.metrics().inc_signals_dropped_stale();
                            observer.on_log(&format!("[{key}] signal expired while waiting: {reason}"));
                            return Ok(report.stale(reason));
                        }
                    }
                }
                Some(pct) => {
                    if low_payout_notified {
                        observer.on_log(&format!("[{key}] payout recovered ({pct}%)"));
                        low_payout_notified = false;
                    }
                    break pct;
                }
            }
        };

        let balance = engine.gateway().balance().await.ok();
        let floor_breached = balance
            .as_ref()
            .map(|b| b.amount - stake < cfg.min_balance)
            .unwrap_or(true);
        if floor_breached {
            observer.on_log(&format!(
                "[{key}] stake {stake} would breach balance floor {}, aborting series",
                cfg.min_balance
            ));
            observer.on_status("series aborted");
            return Ok(report.aborted("balance floor"));
        }

        let account_mode =
            AccountMode::from_demo_flag(engine.gateway().is_demo().await.unwrap_or(false));

        // Time has passed since the gates: the signal must still be fresh
        // at the moment the network placement goes out.
        if step == 0 {
            if let Err(reason) =
                validity::check_signal(cfg, event.arrived_at, event.meta.next_candle_ts_ms, max_age)
            {
                engine.metrics().inc_signals_dropped_stale();
                observer.on_log(&format!("[{key}] signal expired before placement: {reason}"));
                return Ok(report.stale(reason));
            }
        }

        let expiry = match cfg.trade_kind {
            TradeKind::Sprint => TradeExpiry::Sprint {
                minutes: expiry_minutes,
            },
            TradeKind::Classic => match event.meta.next_candle_ts_ms {
                Some(end_ts_ms) => TradeExpiry::Classic { end_ts_ms },
                None => {
                    observer.on_log(&format!("[{key}] no expiry anchor for classic trade"));
                    return Ok(report.aborted("no expiry anchor"));
                }
            },
        };
        let order = TradeOrder {
            symbol: key.symbol().to_string(),
            direction: event.direction,
            stake,
            expiry,
            currency: cfg.currency.clone(),
        };

        observer.on_status("placing trade");
        info!(
            key = %key,
            direction = %event.direction,
            %stake,
            payout,
            step,
            series = %series,
            "placing trade"
        );

        let mut trade_id: Option<String> = None;
        for attempt in 1..=cfg.placement_attempts {
            let gw = engine.gateway().clone();
            let order_for_job = order.clone();
            let job = engine
                .placement()
                .enqueue(async move { gw.place_trade(&order_for_job).await });

            let placed = control
                .wait(job, None)
                .await
                .map_err(|_| EngineError::Cancelled)?;

            match placed {
                // Queue stopped: the engine is shutting down.
                Err(queue_err) => return Err(queue_err.into()),
                Ok(Ok(Some(id))) => {
                    trade_id = Some(id);
                    break;
                }
                Ok(Ok(None)) => {
                    // Business rejection: never retried.
                    observer.on_log(&format!("[{key}] venue refused the trade"));
                    break;
                }
                Ok(Err(e)) => {
                    engine.metrics().inc_placement_failures();
                    warn!(key = %key, attempt, error = %e, "trade placement failed");
                    if attempt < cfg.placement_attempts {
                        control
                            .sleep(PLACEMENT_RETRY_PAUSE)
                            .await
                            .map_err(|_| EngineError::Cancelled)?;
                    }
                }
            }
        }

        let Some(trade_id) = trade_id else {
            observer.on_status("trade placement failed");
            return Ok(report.aborted("placement failed"));
        };

        engine.metrics().inc_trades_placed();

        let now_ms = epoch_ms();
        let (trade_wait, expected_end_ms) = match expiry {
            TradeExpiry::Sprint { minutes } => (
                Duration::from_secs(u64::from(minutes) * 60),
                now_ms + i64::from(minutes) * 60_000,
            ),
            TradeExpiry::Classic { end_ts_ms } => (
                Duration::from_millis(end_ts_ms.saturating_sub(now_ms).max(0) as u64),
                end_ts_ms,
            ),
        };

        observer.on_trade_pending(&PendingTradeEvent {
            trade_id: trade_id.clone(),
            symbol: key.symbol().to_string(),
            timeframe: key.timeframe().to_string(),
            direction: event.direction,
            stake,
            payout_percent: payout,
            wait: trade_wait,
            expected_end_ms,
            account_mode,
            indicator: indicator.clone(),
            series: series.clone(),
            signal_at_ms,
            placed_at_ms: now_ms,
        });
        engine
            .board()
            .register(&trade_id, key.symbol(), key.timeframe());
        match engine.board().summary() {
            Some(summary) => observer.on_status(&format!("awaiting result: {summary}")),
            None => observer.on_status("awaiting result"),
        }

        let initial_wait = cfg.result_wait.min(trade_wait.max(Duration::from_secs(1)));
        let gw = engine.gateway().clone();
        let settle_id = trade_id.clone();
        let settle = engine
            .results()
            .enqueue(async move { gw.check_result(&settle_id, initial_wait).await });

        let profit: Option<Decimal> = match control.wait(settle, None).await {
            Err(_) => {
                // Stop requested: the in-flight check keeps running on its
                // own, we just no longer react to it.
                engine.board().unregister(&trade_id);
                return Err(EngineError::Cancelled);
            }
            Ok(Err(queue_err)) => {
                warn!(key = %key, trade_id = %trade_id, error = %queue_err, "settlement queue error");
                None
            }
            Ok(Ok(Err(gateway_err))) => {
                warn!(key = %key, trade_id = %trade_id, error = %gateway_err, "settlement check failed");
                None
            }
            Ok(Ok(Ok(profit))) => profit,
        };

        engine.board().unregister(&trade_id);

        match TradeResult::from_profit(profit) {
            TradeResult::Profit(_) => engine.metrics().inc_trades_won(),
            TradeResult::Loss(_) => engine.metrics().inc_trades_lost(),
            TradeResult::Unknown => engine.metrics().inc_trades_unknown(),
            TradeResult::Pending => {}
        }

        observer.on_trade_result(&SettledTradeEvent {
            trade_id: trade_id.clone(),
            symbol: key.symbol().to_string(),
            timeframe: key.timeframe().to_string(),
            direction: event.direction,
            stake,
            payout_percent: payout,
            profit,
            account_mode,
            indicator: indicator.clone(),
            series: series.clone(),
        });

        report.trades += 1;
        report.net += profit.unwrap_or(Decimal::ZERO);
        step += 1;

        // The outcome reaches the policy exactly as reported: an unknown
        // result stays None.
        decision = policy.after_result(profit);
    }

    observer.on_status("series finished");
    info!(
        key = %key,
        series = %series,
        trades = report.trades,
        net = %report.net,
        "series finished"
    );
    Ok(report)
}
