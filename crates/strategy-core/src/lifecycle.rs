//! Strategy lifecycle states.

use std::fmt;

/// State machine: `Created → Running ⇄ Paused → Stopped`.
///
/// `Stopped` is terminal within one run but `start()` may re-run a stopped
/// strategy, resetting its signaling primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Paused,
    Stopped,
}

impl LifecycleState {
    /// `start()` is legal from `Created` and `Stopped`.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Created | Self::Stopped)
    }

    /// `pause()` is legal from `Running`; pausing a paused strategy is an
    /// idempotent no-op handled by the caller.
    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// `resume()` is legal from `Paused`.
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// `stop()` is legal from any state.
    pub fn can_stop(&self) -> bool {
        true
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
