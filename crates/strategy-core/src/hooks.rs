//! Optional strategy capabilities.

/// Hooks a strategy implementation may provide.
///
/// Absence of a capability is a no-op default method, not a runtime
/// presence check. Hook failures are the implementor's business; the
/// engine calls them best-effort and never lets them abort a transition.
pub trait StrategyHooks: Send + Sync {
    /// Called after the strategy transitions to paused.
    fn on_pause(&self) {}

    /// Called after the strategy resumes.
    fn on_resume(&self) {}

    /// Called while the strategy is stopping, before tasks are awaited.
    fn on_stop(&self) {}
}

/// The empty capability set.
pub struct NoHooks;

impl StrategyHooks for NoHooks {}
