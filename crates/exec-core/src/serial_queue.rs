//! Strict one-at-a-time job queue with future-style result delivery.

use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::QueueError;

struct Job<T> {
    reply: oneshot::Sender<Result<T, QueueError>>,
    future: BoxFuture<'static, T>,
    exec_timeout: Option<Duration>,
}

/// FIFO queue whose jobs execute strictly one at a time on a dedicated
/// worker task.
///
/// The venue processes trade placements sequentially; concurrent requests
/// only produce spurious retries. Serializing placements preserves arrival
/// order and keeps exactly one request in flight.
pub struct SerializedJobQueue<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<Job<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> SerializedJobQueue<T> {
    /// Create the queue and spawn its worker. Must be called from within a
    /// tokio runtime.
    pub fn new(name: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<T>>();

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if job.reply.is_closed() {
                    // Caller gave up while queued; skip the job entirely.
                    continue;
                }
                let result = match job.exec_timeout {
                    Some(limit) => match tokio::time::timeout(limit, job.future).await {
                        Ok(value) => Ok(value),
                        Err(_) => Err(QueueError::DeadlineExceeded),
                    },
                    None => Ok(job.future.await),
                };
                let _ = job.reply.send(result);
            }
        });

        Self {
            name,
            tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue a job and wait for it to complete.
    pub async fn enqueue<F>(&self, future: F) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.submit(future, None, None).await
    }

    /// Enqueue a job with deadlines.
    ///
    /// `total` bounds time-in-queue plus execution; `exec` additionally
    /// bounds just the execution once the job is picked up.
    pub async fn enqueue_with_deadline<F>(
        &self,
        future: F,
        total: Duration,
        exec: Option<Duration>,
    ) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.submit(future, exec, Some(total)).await
    }

    async fn submit<F>(
        &self,
        future: F,
        exec: Option<Duration>,
        total: Option<Duration>,
    ) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job = Job {
            reply,
            future: future.boxed(),
            exec_timeout: exec,
        };
        self.tx.send(job).map_err(|_| QueueError::Stopped)?;

        let awaited = async { rx.await.unwrap_or(Err(QueueError::Stopped)) };
        match total {
            Some(limit) => tokio::time::timeout(limit, awaited)
                .await
                .unwrap_or(Err(QueueError::DeadlineExceeded)),
            None => awaited.await,
        }
    }

    /// Stop the worker.
    ///
    /// The in-flight job (if any) is cancelled; queued jobs and later
    /// enqueues observe [`QueueError::Stopped`]. Idempotent.
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            debug!(queue = self.name, "stopping serialized queue");
            handle.abort();
            let _ = handle.await;
        }
    }
}
