//! Versioned per-key signal distribution bus.
//!
//! External producers push directional signals for (symbol, timeframe)
//! pairs; strategy tasks wait for signals newer than a version they have
//! already seen. Every push (including direction-less "clear" pushes) bumps
//! the key version and wakes waiters, so "no signal yet" and "signal
//! cleared" are distinguishable from "signal present".
//!
//! A push for a concrete pair fans out to four keys: the exact pair plus
//! all wildcard combinations that match it, so wildcard-bound strategies
//! observe every concrete signal.
//!
//! # Ordering
//!
//! Versions are strictly increasing under a per-key critical section. A
//! waiter that passes `since_version = current` only wakes on a *later*
//! push, never spuriously.

mod bus;
mod state;

pub use bus::{SignalBus, SharedSignalBus, create_signal_bus};
pub use state::{SignalEvent, SignalMeta, SignalSnapshot, WaitOptions, WaitTimeout};
