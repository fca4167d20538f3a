//! Bot lifecycle container and manager.

use std::sync::Arc;

use parking_lot::Mutex;
use strategy_core::{
    control_pair, ControlHandle, LifecycleState, NoHooks, NullObserver, SharedObserver,
    StrategyError, StrategyHooks,
};
use strategy_core::BoxedStakePolicy;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::coordinator::Coordinator;
use crate::engine::SharedEngine;
use crate::error::EngineError;

/// Factory producing a fresh stake policy per trade series.
pub type PolicyFactory = Arc<dyn Fn() -> BoxedStakePolicy + Send + Sync>;

struct BotRuntime {
    listener: JoinHandle<()>,
    coordinator: Arc<Coordinator>,
}

/// Owns one strategy: its configuration, control signals and tasks.
///
/// Lifecycle: `Created → Running ⇄ Paused → Stopped`; `start()` may re-run
/// a stopped bot with fresh signaling state.
pub struct Bot {
    cfg: Arc<StrategyConfig>,
    engine: SharedEngine,
    observer: SharedObserver,
    policy_factory: PolicyFactory,
    hooks: Arc<dyn StrategyHooks>,
    state: Mutex<LifecycleState>,
    control: Mutex<Option<ControlHandle>>,
    runtime: Mutex<Option<BotRuntime>>,
}

impl Bot {
    /// Create a bot. Fails on invalid configuration.
    pub fn new(
        cfg: StrategyConfig,
        engine: SharedEngine,
        policy_factory: PolicyFactory,
    ) -> Result<Self, EngineError> {
        cfg.validate()?;
        Ok(Self {
            cfg: Arc::new(cfg),
            engine,
            observer: Arc::new(NullObserver),
            policy_factory,
            hooks: Arc::new(NoHooks),
            state: Mutex::new(LifecycleState::Created),
            control: Mutex::new(None),
            runtime: Mutex::new(None),
        })
    }

    /// Attach an observer for status, log and trade callbacks.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Attach strategy hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn StrategyHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Start (or restart) the strategy: reset control signals, spawn the
    /// signal listener and coordinator.
    pub fn start(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            if !state.can_start() {
                return Err(StrategyError::IllegalTransition(format!(
                    "cannot start from {state}"
                ))
                .into());
            }
            *state = LifecycleState::Running;
        }

        let (handle, token) = control_pair();
        let coordinator = Coordinator::new(
            self.engine.clone(),
            self.cfg.clone(),
            self.observer.clone(),
            self.policy_factory.clone(),
            token,
        );
        let listener = tokio::spawn(coordinator.clone().run_listener());

        *self.control.lock() = Some(handle);
        *self.runtime.lock() = Some(BotRuntime {
            listener,
            coordinator,
        });

        info!(bot = %self.cfg.name, "strategy started");
        Ok(())
    }

    /// Pause the strategy. Idempotent; a no-op outside `Running`.
    pub fn pause(&self) {
        {
            let mut state = self.state.lock();
            if !state.can_pause() {
                debug!(bot = %self.cfg.name, state = %state, "pause ignored");
                return;
            }
            *state = LifecycleState::Paused;
        }
        if let Some(handle) = &*self.control.lock() {
            handle.pause();
        }
        self.hooks.on_pause();
        self.observer.on_status("paused");
        info!(bot = %self.cfg.name, "strategy paused");
    }

    /// Resume the strategy. Idempotent; a no-op outside `Paused`.
    pub fn resume(&self) {
        {
            let mut state = self.state.lock();
            if !state.can_resume() {
                debug!(bot = %self.cfg.name, state = %state, "resume ignored");
                return;
            }
            *state = LifecycleState::Running;
        }
        if let Some(handle) = &*self.control.lock() {
            handle.resume();
        }
        self.hooks.on_resume();
        self.observer.on_status("waiting for signal");
        info!(bot = %self.cfg.name, "strategy resumed");
    }

    /// Stop the strategy from any state and wait for its tasks.
    ///
    /// In-flight venue calls are not cancelled; their results are simply
    /// no longer acted upon. Idempotent.
    pub async fn stop(&self) {
        let was_active = {
            let mut state = self.state.lock();
            let was_active = *state != LifecycleState::Stopped;
            *state = LifecycleState::Stopped;
            was_active
        };

        if let Some(handle) = self.control.lock().take() {
            handle.stop();
        }
        if was_active {
            // Best-effort: a misbehaving hook must not block shutdown.
            self.hooks.on_stop();
        }

        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            let _ = runtime.listener.await;
            runtime.coordinator.shutdown().await;
        }

        if was_active {
            self.observer.on_status("stopped");
            info!(bot = %self.cfg.name, "strategy stopped");
        }
    }
}

/// Collection of all active bots.
#[derive(Default)]
pub struct BotManager {
    bots: Mutex<Vec<Arc<Bot>>>,
}

impl BotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bot(&self, bot: Arc<Bot>) {
        self.bots.lock().push(bot);
    }

    /// Detach a bot by name. The caller is responsible for stopping it.
    pub fn remove_bot(&self, name: &str) -> Option<Arc<Bot>> {
        let mut bots = self.bots.lock();
        let index = bots.iter().position(|bot| bot.name() == name)?;
        Some(bots.remove(index))
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<Bot>> {
        self.bots.lock().iter().find(|bot| bot.name() == name).cloned()
    }

    pub fn all_bots(&self) -> Vec<Arc<Bot>> {
        self.bots.lock().clone()
    }

    /// Stop every registered bot.
    pub async fn stop_all(&self) {
        let bots = self.all_bots();
        for bot in bots {
            bot.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::examples::FixedStakePolicy;
    use async_trait::async_trait;
    use gateway::{AccountBalance, BrokerGateway, GatewayError, PayoutQuote, TradeOrder};
    use model::{epoch_ms, Direction, Signal, TradeKind};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};
    use strategy_core::{PendingTradeEvent, SettledTradeEvent, TradeObserver};

    struct MockGateway {
        payout: u32,
        balance: Decimal,
        profit: Decimal,
        settle_delay: Duration,
        next_id: AtomicU32,
        active: AtomicU32,
        max_active: AtomicU32,
        placed: Mutex<Vec<TradeOrder>>,
    }

    impl MockGateway {
        fn new(payout: u32, balance: Decimal, profit: Decimal, settle_delay: Duration) -> Self {
            Self {
                payout,
                balance,
                profit,
                settle_delay,
                next_id: AtomicU32::new(0),
                active: AtomicU32::new(0),
                max_active: AtomicU32::new(0),
                placed: Mutex::new(Vec::new()),
            }
        }

        fn placed_directions(&self) -> Vec<Direction> {
            self.placed.lock().iter().map(|order| order.direction).collect()
        }
    }

    #[async_trait]
    impl BrokerGateway for MockGateway {
        async fn place_trade(&self, order: &TradeOrder) -> Result<Option<String>, GatewayError> {
            self.placed.lock().push(order.clone());
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(format!("t{id}")))
        }

        async fn check_result(
            &self,
            _trade_id: &str,
            _initial_wait: Duration,
        ) -> Result<Option<Decimal>, GatewayError> {
            tokio::time::sleep(self.settle_delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(self.profit))
        }

        async fn payout_percent(&self, _quote: &PayoutQuote) -> Result<Option<u32>, GatewayError> {
            Ok(Some(self.payout))
        }

        async fn balance(&self) -> Result<AccountBalance, GatewayError> {
            Ok(AccountBalance {
                amount: self.balance,
                currency: "USD".to_string(),
            })
        }

        async fn is_demo(&self) -> Result<bool, GatewayError> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct CapturingObserver {
        statuses: Mutex<Vec<String>>,
        pending: Mutex<Vec<PendingTradeEvent>>,
        results: Mutex<Vec<SettledTradeEvent>>,
    }

    impl TradeObserver for CapturingObserver {
        fn on_status(&self, status: &str) {
            self.statuses.lock().push(status.to_string());
        }

        fn on_trade_pending(&self, event: &PendingTradeEvent) {
            self.pending.lock().push(event.clone());
        }

        fn on_trade_result(&self, event: &SettledTradeEvent) {
            self.results.lock().push(event.clone());
        }
    }

    fn make_signal(symbol: &str, direction: Direction) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            timeframe: "M1".to_string(),
            direction: Some(direction),
            indicator: Some("X".to_string()),
            candle_ts_ms: Some(epoch_ms()),
            next_candle_ts_ms: None,
        }
    }

    fn fixed_policy(stake: Decimal) -> PolicyFactory {
        Arc::new(move || Box::new(FixedStakePolicy::new(stake)) as BoxedStakePolicy)
    }

    fn fast_config(name: &str, symbol: &str) -> StrategyConfig {
        let mut cfg = StrategyConfig::new(name, symbol, "M1", TradeKind::Sprint);
        cfg.result_wait = Duration::from_millis(10);
        cfg
    }

    async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) {
        let start = Instant::now();
        while !condition() {
            assert!(
                start.elapsed() < timeout,
                "condition not met within {timeout:?}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_end_to_end_trade_cycle() {
        let mock = Arc::new(MockGateway::new(
            85,
            dec!(10000),
            dec!(85),
            Duration::from_millis(30),
        ));
        let engine = Engine::new(EngineConfig::default(), mock.clone());
        let observer = Arc::new(CapturingObserver::default());

        let bot = Bot::new(
            fast_config("bot", "EURUSD"),
            engine.clone(),
            fixed_policy(dec!(100)),
        )
        .unwrap()
        .with_observer(observer.clone());

        bot.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        engine.bus().push(&make_signal("EURUSD", Direction::Up));

        wait_until(|| observer.results.lock().len() == 1, Duration::from_secs(3)).await;
        bot.stop().await;
        engine.shutdown().await;

        let pending = observer.pending.lock();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].stake, dec!(100));
        assert_eq!(pending[0].payout_percent, 85);
        assert_eq!(pending[0].direction, Direction::Up);
        assert_eq!(pending[0].indicator, "X");

        let results = observer.results.lock();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].profit, Some(dec!(85)));
        assert_eq!(results[0].trade_id, pending[0].trade_id);

        // The slot limiter is back to its prior count.
        assert_eq!(engine.slots().current().await, 0);
        assert_eq!(mock.placed.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_slot_keeps_only_freshest_signal() {
        let mock = Arc::new(MockGateway::new(
            85,
            dec!(10000),
            dec!(85),
            Duration::from_millis(300),
        ));
        let engine = Engine::new(EngineConfig::default(), mock.clone());
        let observer = Arc::new(CapturingObserver::default());

        let bot = Bot::new(
            fast_config("bot", "EURUSD"),
            engine.clone(),
            fixed_policy(dec!(100)),
        )
        .unwrap()
        .with_observer(observer.clone());

        bot.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // A becomes the active trade; B and C arrive while the key is
        // busy. B is displaced by C and never placed.
        engine.bus().push(&make_signal("EURUSD", Direction::Up));
        wait_until(|| !mock.placed.lock().is_empty(), Duration::from_secs(2)).await;

        engine.bus().push(&make_signal("EURUSD", Direction::Down));
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.bus().push(&make_signal("EURUSD", Direction::Up));

        wait_until(|| observer.results.lock().len() == 2, Duration::from_secs(5)).await;
        bot.stop().await;
        engine.shutdown().await;

        assert_eq!(
            mock.placed_directions(),
            vec![Direction::Up, Direction::Up],
            "the displaced Down signal must never reach the venue"
        );
    }

    #[tokio::test]
    async fn test_global_lock_serializes_across_trade_keys() {
        let mock = Arc::new(MockGateway::new(
            85,
            dec!(10000),
            dec!(85),
            Duration::from_millis(100),
        ));
        let engine = Engine::new(EngineConfig::default(), mock.clone());
        let observer = Arc::new(CapturingObserver::default());

        let mut cfg = fast_config("bot", "*");
        cfg.allow_parallel_trades = false;

        let bot = Bot::new(cfg, engine.clone(), fixed_policy(dec!(100)))
            .unwrap()
            .with_observer(observer.clone());

        bot.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        engine.bus().push(&make_signal("EURUSD", Direction::Up));
        engine.bus().push(&make_signal("GBPUSD", Direction::Down));

        wait_until(|| observer.results.lock().len() == 2, Duration::from_secs(5)).await;
        bot.stop().await;
        engine.shutdown().await;

        assert_eq!(mock.placed.lock().len(), 2);
        assert_eq!(
            mock.max_active.load(Ordering::SeqCst),
            1,
            "executions for different keys must never overlap in global mode"
        );
    }

    #[tokio::test]
    async fn test_stop_while_awaiting_settlement() {
        let mock = Arc::new(MockGateway::new(
            85,
            dec!(10000),
            dec!(85),
            Duration::from_secs(60),
        ));
        let engine = Engine::new(EngineConfig::default(), mock.clone());
        let observer = Arc::new(CapturingObserver::default());

        let bot = Bot::new(
            fast_config("bot", "EURUSD"),
            engine.clone(),
            fixed_policy(dec!(100)),
        )
        .unwrap()
        .with_observer(observer.clone());

        bot.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        engine.bus().push(&make_signal("EURUSD", Direction::Up));
        wait_until(|| observer.pending.lock().len() == 1, Duration::from_secs(2)).await;

        let stop_started = Instant::now();
        bot.stop().await;
        assert!(
            stop_started.elapsed() < Duration::from_secs(2),
            "stop must not wait out the 60s settlement"
        );

        engine.shutdown().await;

        // No result was delivered, the slot was returned, the board is
        // clean.
        assert!(observer.results.lock().is_empty());
        assert_eq!(engine.slots().current().await, 0);
        assert!(engine.board().is_empty());
        assert_eq!(bot.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_pause_blocks_signal_processing() {
        let mock = Arc::new(MockGateway::new(
            85,
            dec!(10000),
            dec!(85),
            Duration::from_millis(10),
        ));
        let engine = Engine::new(EngineConfig::default(), mock.clone());
        let observer = Arc::new(CapturingObserver::default());

        let bot = Bot::new(
            fast_config("bot", "EURUSD"),
            engine.clone(),
            fixed_policy(dec!(100)),
        )
        .unwrap()
        .with_observer(observer.clone());

        bot.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        bot.pause();
        assert_eq!(bot.state(), LifecycleState::Paused);

        engine.bus().push(&make_signal("EURUSD", Direction::Up));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(mock.placed.lock().is_empty(), "paused bot must not trade");

        bot.resume();
        assert_eq!(bot.state(), LifecycleState::Running);

        wait_until(|| observer.results.lock().len() == 1, Duration::from_secs(3)).await;
        bot.stop().await;
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_is_rejected_while_running() {
        let mock = Arc::new(MockGateway::new(
            85,
            dec!(10000),
            dec!(85),
            Duration::from_millis(10),
        ));
        let engine = Engine::new(EngineConfig::default(), mock);

        let bot = Bot::new(
            fast_config("bot", "EURUSD"),
            engine.clone(),
            fixed_policy(dec!(100)),
        )
        .unwrap();

        bot.start().unwrap();
        assert!(bot.start().is_err());

        bot.stop().await;
        // A stopped bot may be started again.
        bot.start().unwrap();
        bot.stop().await;
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_manager_add_find_stop_all() {
        let mock = Arc::new(MockGateway::new(
            85,
            dec!(10000),
            dec!(85),
            Duration::from_millis(10),
        ));
        let engine = Engine::new(EngineConfig::default(), mock);
        let manager = BotManager::new();

        let bot = Arc::new(
            Bot::new(
                fast_config("alpha", "EURUSD"),
                engine.clone(),
                fixed_policy(dec!(100)),
            )
            .unwrap(),
        );
        bot.start().unwrap();
        manager.add_bot(bot.clone());

        assert!(manager.find_by_name("alpha").is_some());
        assert!(manager.find_by_name("beta").is_none());

        manager.stop_all().await;
        assert_eq!(bot.state(), LifecycleState::Stopped);

        assert!(manager.remove_bot("alpha").is_some());
        assert!(manager.all_bots().is_empty());
        engine.shutdown().await;
    }
}
