//! Cooperative pause/stop signaling.
//!
//! Every blocking operation inside the engine goes through a
//! [`ControlToken`] so that `stop()` unblocks parked tasks within one
//! scheduling quantum instead of after whatever they were waiting on.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

/// The strategy was stopped while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("strategy stopped")]
pub struct Stopped;

/// Outcome of a cancellable wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitInterrupted {
    /// The stop signal fired first.
    #[error("strategy stopped")]
    Stopped,
    /// The timeout elapsed first.
    #[error("wait timed out")]
    TimedOut,
}

/// Sender side: owned by the `Bot` driving the lifecycle.
#[derive(Debug)]
pub struct ControlHandle {
    stop_tx: watch::Sender<bool>,
    pause_tx: watch::Sender<bool>,
}

/// Receiver side: cloned into every task of a strategy.
#[derive(Debug, Clone)]
pub struct ControlToken {
    stop_rx: watch::Receiver<bool>,
    pause_rx: watch::Receiver<bool>,
}

/// Create a fresh handle/token pair. `start()` calls this to reset the
/// signaling state of a previous run.
pub fn control_pair() -> (ControlHandle, ControlToken) {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (pause_tx, pause_rx) = watch::channel(false);
    (
        ControlHandle { stop_tx, pause_tx },
        ControlToken { stop_rx, pause_rx },
    )
}

impl ControlHandle {
    /// Signal stop. Also clears pause so that paused waiters unblock and
    /// observe the stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let _ = self.pause_tx.send(false);
    }

    /// Signal pause. Idempotent; a stopped strategy stays stopped.
    pub fn pause(&self) {
        let _ = self.pause_tx.send(true);
    }

    /// Clear pause. Idempotent.
    pub fn resume(&self) {
        let _ = self.pause_tx.send(false);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Derive another token for a newly spawned task.
    pub fn token(&self) -> ControlToken {
        ControlToken {
            stop_rx: self.stop_tx.subscribe(),
            pause_rx: self.pause_tx.subscribe(),
        }
    }
}

impl ControlToken {
    pub fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        *self.pause_rx.borrow()
    }

    /// Resolve once the stop signal fires. A dropped handle counts as
    /// stopped: an orphaned task must not run forever.
    pub async fn stopped(&self) {
        let mut rx = self.stop_rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Cooperative pause point.
    ///
    /// Returns immediately while running; blocks while paused; returns
    /// `Err(Stopped)` as soon as the strategy is stopped, including while
    /// parked in a pause.
    pub async fn pause_point(&self) -> Result<(), Stopped> {
        let mut pause_rx = self.pause_rx.clone();
        loop {
            if self.is_stopped() {
                return Err(Stopped);
            }
            if !*pause_rx.borrow() {
                return Ok(());
            }
            tokio::select! {
                biased;
                _ = self.stopped() => return Err(Stopped),
                changed = pause_rx.changed() => {
                    if changed.is_err() {
                        return Err(Stopped);
                    }
                }
            }
        }
    }

    /// Sleep that unwinds immediately on stop.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Stopped> {
        tokio::select! {
            biased;
            _ = self.stopped() => Err(Stopped),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Await `future`, racing it against the stop signal and an optional
    /// timeout. The losing future is dropped before this returns; nothing
    /// keeps running in the background.
    pub async fn wait<F>(
        &self,
        future: F,
        timeout: Option<Duration>,
    ) -> Result<F::Output, WaitInterrupted>
    where
        F: Future,
    {
        let bounded = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, future)
                    .await
                    .map_err(|_| WaitInterrupted::TimedOut),
                None => Ok(future.await),
            }
        };
        tokio::select! {
            biased;
            _ = self.stopped() => Err(WaitInterrupted::Stopped),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_completes_when_not_stopped() {
        let (_handle, token) = control_pair();
        assert_eq!(token.sleep(Duration::from_millis(10)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_stop_unwinds_long_sleep_quickly() {
        let (handle, token) = control_pair();

        let sleeper = tokio::spawn(async move { token.sleep(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stopped_at = Instant::now();
        handle.stop();
        let result = sleeper.await.unwrap();

        assert_eq!(result, Err(Stopped));
        assert!(
            stopped_at.elapsed() < Duration::from_millis(250),
            "sleep took {:?} to unwind",
            stopped_at.elapsed()
        );
    }

    #[tokio::test]
    async fn test_pause_point_passes_while_running() {
        let (_handle, token) = control_pair();
        assert_eq!(token.pause_point().await, Ok(()));
    }

    #[tokio::test]
    async fn test_pause_point_blocks_until_resume() {
        let (handle, token) = control_pair();
        handle.pause();

        let waiter = tokio::spawn(async move { token.pause_point().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        handle.resume();
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_stop_unblocks_paused_task() {
        let (handle, token) = control_pair();
        handle.pause();

        let waiter = tokio::spawn(async move { token.pause_point().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.stop();
        assert_eq!(waiter.await.unwrap(), Err(Stopped));
    }

    #[tokio::test]
    async fn test_wait_returns_inner_result() {
        let (_handle, token) = control_pair();
        let result = token.wait(async { 42 }, None).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (_handle, token) = control_pair();
        let result = token
            .wait(
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    42
                },
                Some(Duration::from_millis(20)),
            )
            .await;
        assert_eq!(result, Err(WaitInterrupted::TimedOut));
    }

    #[tokio::test]
    async fn test_wait_interrupted_by_stop() {
        let (handle, token) = control_pair();

        let waiter = tokio::spawn(async move {
            token
                .wait(
                    async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        42
                    },
                    None,
                )
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.stop();
        assert_eq!(waiter.await.unwrap(), Err(WaitInterrupted::Stopped));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (handle, token) = control_pair();
        handle.stop();
        handle.stop();
        assert!(token.is_stopped());
    }

    #[tokio::test]
    async fn test_dropped_handle_counts_as_stopped() {
        let (handle, token) = control_pair();
        drop(handle);

        let result = token.sleep(Duration::from_secs(60)).await;
        assert_eq!(result, Err(Stopped));
    }
}
