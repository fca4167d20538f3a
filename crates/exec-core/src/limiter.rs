//! Process-wide cap on concurrently open trades.

use std::sync::Arc;

use tokio::sync::Mutex;

/// Capacity gate for open trades.
///
/// This is not a queue: `try_acquire` never blocks waiting for a slot, and
/// no fairness is provided. Callers that fail to acquire must defer.
#[derive(Debug)]
pub struct SlotLimiter {
    max_open: u32,
    open: Mutex<u32>,
}

/// Shared handle to the slot limiter.
pub type SharedSlotLimiter = Arc<SlotLimiter>;

/// Create a new shared slot limiter.
pub fn create_slot_limiter(max_open: u32) -> SharedSlotLimiter {
    Arc::new(SlotLimiter::new(max_open))
}

impl SlotLimiter {
    pub fn new(max_open: u32) -> Self {
        Self {
            max_open,
            open: Mutex::new(0),
        }
    }

    /// Atomically claim a slot if capacity remains.
    pub async fn try_acquire(&self) -> bool {
        let mut open = self.open.lock().await;
        if *open < self.max_open {
            *open += 1;
            true
        } else {
            false
        }
    }

    /// Return a slot. Clamped at zero.
    pub async fn release(&self) {
        let mut open = self.open.lock().await;
        *open = open.saturating_sub(1);
    }

    /// Number of currently claimed slots.
    pub async fn current(&self) -> u32 {
        *self.open.lock().await
    }

    /// Configured capacity.
    pub fn max_open(&self) -> u32 {
        self.max_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_up_to_capacity() {
        let limiter = SlotLimiter::new(2);

        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
        assert_eq!(limiter.current().await, 2);
    }

    #[tokio::test]
    async fn test_release_frees_capacity() {
        let limiter = SlotLimiter::new(1);

        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        limiter.release().await;
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn test_release_clamps_at_zero() {
        let limiter = SlotLimiter::new(1);

        limiter.release().await;
        limiter.release().await;
        assert_eq!(limiter.current().await, 0);

        assert!(limiter.try_acquire().await);
        assert_eq!(limiter.current().await, 1);
    }

    #[tokio::test]
    async fn test_max_open() {
        let limiter = SlotLimiter::new(7);
        assert_eq!(limiter.max_open(), 7);
    }
}
