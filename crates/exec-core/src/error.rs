//! Queue error types.

use thiserror::Error;

/// Errors observed by callers of the execution queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was stopped before the job completed.
    #[error("queue stopped")]
    Stopped,

    /// The job missed its deadline (queue wait plus execution, or the
    /// execution-only limit).
    #[error("job deadline exceeded")]
    DeadlineExceeded,
}
