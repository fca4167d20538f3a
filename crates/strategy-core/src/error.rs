//! Strategy error types.

use thiserror::Error;

/// Errors raised while configuring or driving a strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The strategy is not in a state that allows the requested transition.
    #[error("illegal lifecycle transition: {0}")]
    IllegalTransition(String),

    /// Internal strategy error.
    #[error("internal error: {0}")]
    Internal(String),
}
