//! The shared engine registry.
//!
//! One `Engine` per process holds every piece of state that strategies
//! share: the signal bus, the payout cache, the open-trade limiter, the
//! placement and settlement queues, the global trade lock and the venue
//! gateway. Bots receive a handle and never reach around it.

use std::sync::Arc;

use exec_core::{
    create_slot_limiter, PendingTradeBoard, ResultCollectionQueue, SerializedJobQueue,
    SharedSlotLimiter,
};
use gateway::{GatewayError, SharedGateway};
use metrics::{create_metrics, SharedMetrics};
use payout_cache::PayoutCache;
use signal_bus::{create_signal_bus, SharedSignalBus};
use tokio::sync::Mutex;

use crate::config::EngineConfig;

/// Result of a serialized placement job.
pub(crate) type PlacementResult = Result<Option<String>, GatewayError>;

/// Shared engine handle.
pub type SharedEngine = Arc<Engine>;

/// Process-wide registry of shared trading state.
pub struct Engine {
    bus: SharedSignalBus,
    payouts: PayoutCache,
    slots: SharedSlotLimiter,
    placement: SerializedJobQueue<PlacementResult>,
    results: ResultCollectionQueue,
    /// Serializes all execution when a strategy opts out of parallel
    /// trades. Held across one full placement/settlement cycle.
    global_trade_lock: Mutex<()>,
    gateway: SharedGateway,
    metrics: SharedMetrics,
    board: PendingTradeBoard,
}

impl Engine {
    /// Build an engine. Must be called from within a tokio runtime (the
    /// queues spawn their worker tasks immediately).
    pub fn new(config: EngineConfig, gateway: SharedGateway) -> SharedEngine {
        Arc::new(Self {
            bus: create_signal_bus(),
            payouts: PayoutCache::new(),
            slots: create_slot_limiter(config.max_open_trades),
            placement: SerializedJobQueue::new("placement"),
            results: ResultCollectionQueue::new(config.max_result_checks),
            global_trade_lock: Mutex::new(()),
            gateway,
            metrics: create_metrics(),
            board: PendingTradeBoard::new(),
        })
    }

    pub fn bus(&self) -> &SharedSignalBus {
        &self.bus
    }

    pub fn payouts(&self) -> &PayoutCache {
        &self.payouts
    }

    pub fn slots(&self) -> &SharedSlotLimiter {
        &self.slots
    }

    pub(crate) fn placement(&self) -> &SerializedJobQueue<PlacementResult> {
        &self.placement
    }

    pub(crate) fn results(&self) -> &ResultCollectionQueue {
        &self.results
    }

    pub(crate) fn global_trade_lock(&self) -> &Mutex<()> {
        &self.global_trade_lock
    }

    pub fn gateway(&self) -> &SharedGateway {
        &self.gateway
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn board(&self) -> &PendingTradeBoard {
        &self.board
    }

    /// Stop both execution queues. Call after every bot has been stopped;
    /// in-flight jobs are cancelled.
    pub async fn shutdown(&self) {
        self.placement.stop().await;
        self.results.stop().await;
    }
}
