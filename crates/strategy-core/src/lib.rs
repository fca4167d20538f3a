//! Strategy-side building blocks for the trade engine.
//!
//! This crate provides everything a strategy lifecycle is made of:
//!
//! - **Control signaling**: `ControlHandle`/`ControlToken` — cooperative
//!   pause and stop, cancellable sleeps and waits
//! - **Lifecycle states**: the `Created → Running ⇄ Paused → Stopped`
//!   machine
//! - **Stake policies**: the pluggable `StakePolicy` trait deciding the
//!   next stake of a trade series
//! - **Observers**: `TradeObserver` callbacks for status, pending trades
//!   and settled results
//! - **Hooks**: the `StrategyHooks` capability trait with no-op defaults

mod control;
mod error;
mod hooks;
mod lifecycle;
mod observer;
mod policy;

pub use control::{control_pair, ControlHandle, ControlToken, Stopped, WaitInterrupted};
pub use error::StrategyError;
pub use hooks::{NoHooks, StrategyHooks};
pub use lifecycle::LifecycleState;
pub use observer::{
    NullObserver, PendingTradeEvent, SettledTradeEvent, SharedObserver, TradeObserver,
};
pub use policy::{generate_series_id, BoxedStakePolicy, StakeDecision, StakePolicy};
