//! Engine error types.

use thiserror::Error;

/// Errors that can occur while driving trade execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Strategy configuration or lifecycle error.
    #[error("strategy error: {0}")]
    Strategy(#[from] strategy_core::StrategyError),

    /// Venue gateway error.
    #[error("gateway error: {0}")]
    Gateway(#[from] gateway::GatewayError),

    /// Execution queue error.
    #[error("queue error: {0}")]
    Queue(#[from] exec_core::QueueError),

    /// The strategy was stopped mid-execution.
    #[error("execution cancelled")]
    Cancelled,
}
