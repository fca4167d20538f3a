//! Settlement polling queue: one task per job, independently cancellable.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::QueueError;

/// Default cap on concurrently running settlement checks.
const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Queue that spawns a dedicated task per job.
///
/// Unlike [`SerializedJobQueue`](crate::SerializedJobQueue), jobs here run
/// in parallel (bounded by a semaphore): slow settlement polling for one
/// trade must never block checking another.
pub struct ResultCollectionQueue {
    tx: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    running: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Default for ResultCollectionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl ResultCollectionQueue {
    /// Create the queue and spawn its dispatch task. Must be called from
    /// within a tokio runtime.
    pub fn new(max_concurrent: usize) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();
        let running: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let tracked = running.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    job.await;
                });
                let mut tracked = tracked.lock();
                tracked.retain(|h| !h.is_finished());
                tracked.push(handle);
            }
        });

        Self {
            tx,
            dispatcher: Mutex::new(Some(dispatcher)),
            running,
        }
    }

    /// Enqueue a job; resolves with the job's own result.
    pub async fn enqueue<T, F>(&self, future: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let wrapped: BoxFuture<'static, ()> = async move {
            let _ = reply.send(future.await);
        }
        .boxed();

        self.tx.send(wrapped).map_err(|_| QueueError::Stopped)?;
        rx.await.map_err(|_| QueueError::Stopped)
    }

    /// Stop the queue: cancel the dispatch loop, cancel every running job
    /// task, cancel-complete queued jobs, and wait for all of it before
    /// returning. Idempotent.
    pub async fn stop(&self) {
        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher {
            debug!("stopping result collection queue");
            handle.abort();
            let _ = handle.await;
        }

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.running.lock());
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_jobs_run_in_parallel() {
        let queue = ResultCollectionQueue::new(8);
        let started = Instant::now();

        let slow = |ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms
        };

        let (a, b, c) = tokio::join!(
            queue.enqueue(slow(50)),
            queue.enqueue(slow(50)),
            queue.enqueue(slow(50)),
        );

        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (50, 50, 50));
        // Three 50ms jobs in parallel finish far sooner than 150ms.
        assert!(started.elapsed() < Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_slow_job_does_not_block_fast_one() {
        let queue = ResultCollectionQueue::new(8);

        let slow = queue.enqueue(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            "slow"
        });
        let fast = queue.enqueue(async { "fast" });

        let fast_result = tokio::time::timeout(Duration::from_millis(100), fast)
            .await
            .expect("fast job must not wait behind the slow one");
        assert_eq!(fast_result.unwrap(), "fast");
        assert_eq!(slow.await.unwrap(), "slow");
    }

    #[tokio::test]
    async fn test_stop_cancels_running_jobs() {
        let queue = Arc::new(ResultCollectionQueue::new(8));

        let runner = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .enqueue(async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        1
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;

        let stop_started = Instant::now();
        queue.stop().await;
        assert!(stop_started.elapsed() < Duration::from_secs(1));

        assert_eq!(runner.await.unwrap(), Err(QueueError::Stopped));
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_fails() {
        let queue = ResultCollectionQueue::new(8);
        queue.stop().await;

        let result = queue.enqueue(async { 1 }).await;
        assert_eq!(result, Err(QueueError::Stopped));
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let queue = ResultCollectionQueue::new(1);
        let started = Instant::now();

        let slow = |ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        };

        let (a, b) = tokio::join!(queue.enqueue(slow(50)), queue.enqueue(slow(50)));
        a.unwrap();
        b.unwrap();

        // With a single permit the jobs serialize.
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
