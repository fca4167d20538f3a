//! Execution-side concurrency primitives.
//!
//! This crate provides the building blocks the execution coordinator is
//! assembled from:
//!
//! - **SlotLimiter**: process-wide cap on concurrently open trades
//! - **LatestMailbox**: one-slot overwrite buffer (a deferred signal never
//!   queues behind another; the freshest one wins)
//! - **SerializedJobQueue**: strict one-at-a-time execution with
//!   future-style result delivery (trade placement must be serialized
//!   against the venue)
//! - **ResultCollectionQueue**: one task per job with bounded concurrency
//!   (settlement polling for one trade must never block another)
//! - **PendingTradeBoard**: registry of trades awaiting settlement, for
//!   status display
//!
//! The two queue types are deliberately different concurrency shapes for
//! different call sites.

mod board;
mod error;
mod limiter;
mod mailbox;
mod result_queue;
mod serial_queue;

pub use board::{PendingTrade, PendingTradeBoard};
pub use error::QueueError;
pub use limiter::{create_slot_limiter, SharedSlotLimiter, SlotLimiter};
pub use mailbox::LatestMailbox;
pub use result_queue::ResultCollectionQueue;
pub use serial_queue::SerializedJobQueue;
