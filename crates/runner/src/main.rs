use std::sync::Arc;
use std::time::Duration;

use connector_ws::{run_connector, ConnectorConfig};
use engine::examples::{FibonacciPolicy, FixedStakePolicy, MartingalePolicy};
use engine::{Bot, BotManager, Engine, EngineConfig, PolicyFactory, StrategyConfig};
use gateway::{RestBrokerGateway, SessionCredentials};
use model::TradeKind;
use rust_decimal::Decimal;
use strategy_core::{BoxedStakePolicy, PendingTradeEvent, SettledTradeEvent, TradeObserver};
use tokio::sync::watch;
use tracing::{error, info};

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Observer that routes bot callbacks into the log.
struct LogObserver;

impl TradeObserver for LogObserver {
    fn on_status(&self, status: &str) {
        info!(status, "bot status");
    }

    fn on_log(&self, line: &str) {
        info!("{line}");
    }

    fn on_trade_pending(&self, event: &PendingTradeEvent) {
        info!(
            trade_id = %event.trade_id,
            symbol = %event.symbol,
            timeframe = %event.timeframe,
            direction = %event.direction,
            stake = %event.stake,
            payout = event.payout_percent,
            series = %event.series,
            "trade pending"
        );
    }

    fn on_trade_result(&self, event: &SettledTradeEvent) {
        info!(
            trade_id = %event.trade_id,
            symbol = %event.symbol,
            profit = ?event.profit,
            series = %event.series,
            "trade settled"
        );
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn build_policy_factory(name: &str, stake: Decimal) -> PolicyFactory {
    match name {
        "martingale" => Arc::new(move || {
            Box::new(MartingalePolicy::new(stake, Decimal::from(2), 5, true)) as BoxedStakePolicy
        }),
        "fibonacci" => {
            Arc::new(move || Box::new(FibonacciPolicy::new(stake, 8, true)) as BoxedStakePolicy)
        }
        _ => Arc::new(move || Box::new(FixedStakePolicy::new(stake)) as BoxedStakePolicy),
    }
}

#[tokio::main]
async fn main() {
    common::init_logging();

    let ws_url = env_or("SIGNAL_WS_URL", "ws://127.0.0.1:8080");
    let broker_url = env_or("BROKER_BASE_URL", "https://broker.invalid");
    let symbol = env_or("TRADE_SYMBOL", "*");
    let timeframe = env_or("TRADE_TIMEFRAME", "*");
    let trade_kind = env_or("TRADE_KIND", "sprint")
        .parse::<TradeKind>()
        .unwrap_or(TradeKind::Sprint);
    let policy_name = env_or("STAKE_POLICY", "fixed");
    let stake = env_or("BASE_STAKE", "100")
        .parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::from(100));

    let credentials = match SessionCredentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            error!(error = %e, "missing broker credentials");
            return;
        }
    };
    let broker = match RestBrokerGateway::new(&broker_url, credentials) {
        Ok(broker) => broker,
        Err(e) => {
            error!(error = %e, "failed to build broker gateway");
            return;
        }
    };

    let trade_engine = Engine::new(EngineConfig::default(), Arc::new(broker));

    info!(
        %ws_url,
        %broker_url,
        %symbol,
        %timeframe,
        kind = %trade_kind,
        policy = %policy_name,
        "starting trade runner"
    );

    // Shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal feed connector
    let connector_config = ConnectorConfig {
        url: ws_url,
        auth_token: std::env::var("SIGNAL_WS_TOKEN").ok(),
        ..Default::default()
    };
    let connector_handle = tokio::spawn(run_connector(
        connector_config,
        trade_engine.bus().clone(),
        shutdown_rx,
        trade_engine.metrics().clone(),
    ));

    // Spawn ctrl_c handler
    let shutdown_on_ctrl_c = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, initiating shutdown");
            let _ = shutdown_on_ctrl_c.send(true);
        }
    });

    // Spawn periodic health reporter
    let health_metrics = trade_engine.metrics().clone();
    let mut health_shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = health_metrics.snapshot();
                    info!(
                        signals = snapshot.signals_received,
                        stale = snapshot.signals_dropped_stale,
                        placed = snapshot.trades_placed,
                        won = snapshot.trades_won,
                        lost = snapshot.trades_lost,
                        unknown = snapshot.trades_unknown,
                        reconnects = snapshot.feed_reconnects,
                        "health check"
                    );
                }
                _ = health_shutdown_rx.changed() => {
                    if *health_shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    // Start the bot
    let manager = BotManager::new();
    let config = StrategyConfig::new("runner", &symbol, &timeframe, trade_kind);
    let bot = match Bot::new(
        config,
        trade_engine.clone(),
        build_policy_factory(&policy_name, stake),
    ) {
        Ok(bot) => Arc::new(bot.with_observer(Arc::new(LogObserver))),
        Err(e) => {
            error!(error = %e, "invalid strategy configuration");
            return;
        }
    };
    if let Err(e) = bot.start() {
        error!(error = %e, "failed to start strategy");
        return;
    }
    manager.add_bot(bot);

    // Wait for shutdown
    let mut shutdown_wait_rx = shutdown_tx.subscribe();
    let _ = shutdown_wait_rx.wait_for(|stopped| *stopped).await;

    info!("stopping strategies");
    manager.stop_all().await;
    trade_engine.shutdown().await;
    let _ = connector_handle.await;

    // Print final metrics
    println!("\n{}", trade_engine.metrics().snapshot());

    info!("shutdown complete");
}
