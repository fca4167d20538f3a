//! Per-trade-key execution coordination.
//!
//! Each bot owns one `Coordinator`. The signal listener resolves incoming
//! signals to concrete trade keys and feeds them into per-key lanes; each
//! lane's consumer enforces the dispatch policy:
//!
//! 1. re-validate freshness (a queued signal can go stale),
//! 2. claim an open-trade slot or defer,
//! 3. in global-serialization mode, take the process-wide lock or defer;
//!    otherwise spawn an execution task unless the key is already busy.
//!
//! Deferral is a single-slot overwrite: only the freshest deferred signal
//! per key survives, and it is re-offered as soon as the blocking trade
//! completes (with a polling fallback for cross-key capacity refusals).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use exec_core::LatestMailbox;
use gateway::rules;
use model::{TradeKey, TradeKind};
use parking_lot::Mutex;
use signal_bus::{SignalEvent, WaitOptions, WaitTimeout};
use strategy_core::{ControlToken, SharedObserver};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bot::PolicyFactory;
use crate::config::StrategyConfig;
use crate::engine::SharedEngine;
use crate::error::EngineError;
use crate::execution::{self, SeriesOutcome};
use crate::validity;

/// Bounded depth of each lane's signal queue.
const LANE_QUEUE_CAPACITY: usize = 32;

/// Cadence of the fallback re-offer of deferred signals.
const PENDING_REOFFER_PAUSE: Duration = Duration::from_millis(500);

/// A signal resolved to its concrete trade key, queued for execution.
pub(crate) struct QueuedSignal {
    pub key: TradeKey,
    pub event: SignalEvent,
}

/// Coordination state of one bot: lanes, active-task gates, pending slots.
pub(crate) struct Coordinator {
    engine: SharedEngine,
    cfg: Arc<StrategyConfig>,
    observer: SharedObserver,
    policy_factory: PolicyFactory,
    control: ControlToken,
    lanes: Mutex<HashMap<TradeKey, mpsc::Sender<QueuedSignal>>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    /// Number of active execution tasks per key (0 or 1 unless the
    /// strategy allows concurrent trades per key).
    active: DashMap<TradeKey, u32>,
    exec_tasks: Mutex<Vec<JoinHandle<()>>>,
    pending: DashMap<TradeKey, Arc<LatestMailbox<QueuedSignal>>>,
    drainers: DashMap<TradeKey, ()>,
    drainer_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    pub(crate) fn new(
        engine: SharedEngine,
        cfg: Arc<StrategyConfig>,
        observer: SharedObserver,
        policy_factory: PolicyFactory,
        control: ControlToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            cfg,
            observer,
            policy_factory,
            control,
            lanes: Mutex::new(HashMap::new()),
            consumers: Mutex::new(Vec::new()),
            active: DashMap::new(),
            exec_tasks: Mutex::new(Vec::new()),
            pending: DashMap::new(),
            drainers: DashMap::new(),
            drainer_tasks: Mutex::new(Vec::new()),
        })
    }

    /// Listen on the bus and feed resolved signals into lanes. Runs until
    /// stopped.
    pub(crate) async fn run_listener(self: Arc<Self>) {
        let cfg = self.cfg.clone();
        let listen_key = cfg.signal_key();
        // Only signals newer than "now" are interesting.
        let mut since = self.engine.bus().version(&listen_key);

        self.observer.on_status("waiting for signal");
        info!(bot = %cfg.name, key = %listen_key, "signal listener started");

        loop {
            if self.control.pause_point().await.is_err() {
                break;
            }

            let opts = WaitOptions {
                since_version: Some(since),
                timeout: cfg.signal_timeout,
                max_age: cfg.max_signal_age(cfg.expiry_minutes_for(&cfg.timeframe)),
                grace_delay: cfg.grace_delay,
            };
            let observer = self.observer.clone();
            let listen = self
                .engine
                .bus()
                .wait_for_versioned_with(&listen_key, opts, move |drift| {
                    observer.on_log(&format!(
                        "next forecast overdue by ~{:.1}s",
                        drift.as_secs_f64()
                    ));
                });

            let event = match self.control.wait(listen, None).await {
                Err(_) => break,
                Ok(Err(WaitTimeout)) => {
                    self.observer.on_status("waiting for signal");
                    continue;
                }
                Ok(Ok(event)) => event,
            };
            since = event.version;
            self.engine.metrics().inc_signals_received();

            if cfg.trade_kind == TradeKind::Classic
                && cfg.uses_any_timeframe()
                && !rules::is_classic_timeframe(&event.meta.timeframe)
            {
                self.observer.on_log(&format!(
                    "[{}] timeframe {} not tradable as classic, skipping",
                    event.meta.symbol, event.meta.timeframe
                ));
                continue;
            }

            let key = TradeKey::new(&event.meta.symbol, &event.meta.timeframe);
            debug!(bot = %cfg.name, key = %key, version = event.version, "signal received");
            Self::dispatch(&self, key, event);
        }

        info!(bot = %cfg.name, "signal listener stopped");
    }

    /// Route a signal into its lane, creating the lane on first use.
    pub(crate) fn dispatch(this: &Arc<Self>, key: TradeKey, event: SignalEvent) {
        let tx = Self::lane_sender(this, &key);
        if tx.try_send(QueuedSignal { key: key.clone(), event }).is_err() {
            warn!(key = %key, "lane queue unavailable, dropping signal");
        }
    }

    fn lane_sender(this: &Arc<Self>, key: &TradeKey) -> mpsc::Sender<QueuedSignal> {
        let mut lanes = this.lanes.lock();
        if let Some(tx) = lanes.get(key) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(LANE_QUEUE_CAPACITY);
        let coordinator = this.clone();
        let lane_key = key.clone();
        let consumer = tokio::spawn(async move { coordinator.run_consumer(lane_key, rx).await });
        this.consumers.lock().push(consumer);
        lanes.insert(key.clone(), tx.clone());
        debug!(key = %key, "execution lane created");
        tx
    }

    async fn run_consumer(self: Arc<Self>, key: TradeKey, mut rx: mpsc::Receiver<QueuedSignal>) {
        debug!(key = %key, "lane consumer started");
        loop {
            if self.control.pause_point().await.is_err() {
                break;
            }
            let queued = match self.control.wait(rx.recv(), None).await {
                Err(_) => break,
                Ok(None) => break,
                Ok(Some(queued)) => queued,
            };
            Self::handle_signal(&self, queued).await;
        }
        debug!(key = %key, "lane consumer stopped");
    }

    async fn handle_signal(this: &Arc<Self>, queued: QueuedSignal) {
        let key = queued.key.clone();
        let expiry_minutes = this.cfg.expiry_minutes_for(key.timeframe());
        let max_age = this.cfg.max_signal_age(expiry_minutes);

        // A signal can go stale between enqueue and dequeue.
        if let Err(reason) = validity::check_signal(
            &this.cfg,
            queued.event.arrived_at,
            queued.event.meta.next_candle_ts_ms,
            max_age,
        ) {
            debug!(key = %key, %reason, "dropping stale queued signal");
            this.engine.metrics().inc_signals_dropped_stale();
            return;
        }

        if !this.engine.slots().try_acquire().await {
            debug!(key = %key, "open-trade limit reached, deferring signal");
            Self::defer(this, queued);
            return;
        }

        if !this.cfg.allow_parallel_trades {
            // Global serialization: hold the process-wide lock across the
            // whole execution, inline on this consumer.
            match this.engine.global_trade_lock().try_lock() {
                Ok(guard) => {
                    this.execute(queued).await;
                    drop(guard);
                    this.engine.slots().release().await;
                    Self::drain(this, &key);
                }
                Err(_) => {
                    this.engine.slots().release().await;
                    debug!(key = %key, "global trade lock held, deferring signal");
                    Self::defer(this, queued);
                }
            }
            return;
        }

        // Per-key serialization.
        let already_active = this.active.get(&key).map(|count| *count > 0).unwrap_or(false);
        if already_active && !this.cfg.concurrent_trades_per_key {
            this.engine.slots().release().await;
            debug!(key = %key, "active trade on key, deferring signal");
            Self::defer(this, queued);
            return;
        }

        *this.active.entry(key.clone()).or_insert(0) += 1;
        let coordinator = this.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            coordinator.execute(queued).await;
            coordinator.engine.slots().release().await;
            if let Some(mut count) = coordinator.active.get_mut(&task_key) {
                *count = count.saturating_sub(1);
            }
            Self::drain(&coordinator, &task_key);
        });
        let mut tasks = this.exec_tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    async fn execute(&self, queued: QueuedSignal) {
        let mut policy = (self.policy_factory)();
        let result = execution::run_series(
            &self.engine,
            &self.cfg,
            &self.control,
            &self.observer,
            &queued.key,
            &queued.event,
            policy.as_mut(),
        )
        .await;

        match result {
            Ok(report) => match report.outcome {
                SeriesOutcome::Completed => {}
                SeriesOutcome::Aborted(reason) => {
                    info!(key = %queued.key, reason = %reason, "series aborted");
                }
                SeriesOutcome::Stale(_) => {}
            },
            Err(EngineError::Cancelled) => {
                debug!(key = %queued.key, "execution cancelled");
            }
            Err(e) => {
                warn!(key = %queued.key, error = %e, "execution failed");
            }
        }
    }

    /// Buffer a signal in the key's one-slot mailbox, displacing an older
    /// occupant.
    fn defer(this: &Arc<Self>, queued: QueuedSignal) {
        let key = queued.key.clone();
        let mailbox = this
            .pending
            .entry(key.clone())
            .or_insert_with(|| Arc::new(LatestMailbox::new()))
            .clone();
        if mailbox.replace(queued).is_some() {
            debug!(key = %key, "replaced previously deferred signal");
        }
        this.engine.metrics().inc_signals_deferred();
        Self::ensure_drainer(this, key);
    }

    /// Completion-path drain: re-offer the buffered signal immediately.
    fn drain(this: &Arc<Self>, key: &TradeKey) {
        if let Some(mailbox) = this.pending.get(key) {
            if let Some(queued) = mailbox.take() {
                debug!(key = %key, "re-dispatching deferred signal");
                Self::dispatch(this, queued.key.clone(), queued.event);
            }
        }
    }

    /// Fallback drain for deferrals that no same-key completion will ever
    /// re-offer (capacity refusals, the cross-key global lock). Re-offers
    /// on a fixed cadence until the mailbox stays empty; stale re-offers
    /// die in `handle_signal`.
    fn ensure_drainer(this: &Arc<Self>, key: TradeKey) {
        use dashmap::mapref::entry::Entry;
        match this.drainers.entry(key.clone()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(vacant) => {
                vacant.insert(());
            }
        }

        let coordinator = this.clone();
        let task = tokio::spawn(async move {
            loop {
                if coordinator.control.sleep(PENDING_REOFFER_PAUSE).await.is_err() {
                    break;
                }
                let mailbox = match coordinator.pending.get(&key) {
                    Some(mailbox) => mailbox.clone(),
                    None => break,
                };
                match mailbox.take() {
                    Some(queued) => {
                        Self::dispatch(&coordinator, queued.key.clone(), queued.event)
                    }
                    None => break,
                }
            }
            coordinator.drainers.remove(&key);
            // A deferral may have slipped in while we were exiting.
            let refilled = coordinator
                .pending
                .get(&key)
                .map(|mailbox| !mailbox.is_empty())
                .unwrap_or(false);
            if refilled && !coordinator.control.is_stopped() {
                Self::ensure_drainer(&coordinator, key);
            }
        });
        let mut tasks = this.drainer_tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Tear down lanes and wait for every task this coordinator spawned.
    /// The stop signal must already have fired.
    pub(crate) async fn shutdown(&self) {
        self.lanes.lock().clear();

        let consumers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.consumers.lock());
        for handle in consumers {
            let _ = handle.await;
        }
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.exec_tasks.lock());
        for handle in tasks {
            let _ = handle.await;
        }
        let drainers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.drainer_tasks.lock());
        for handle in drainers {
            let _ = handle.await;
        }

        self.pending.clear();
        self.active.clear();
    }
}
