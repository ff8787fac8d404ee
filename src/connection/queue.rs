// src/connection/queue.rs

//! Defines `OperationQueue`, the per-record command serializer.
//!
//! A stateful control channel desynchronizes if two commands are in flight at
//! once. The queue makes serialization structural rather than incidental: an
//! explicit FIFO drained by a single worker task, so exactly one operation
//! runs per session at any time, in submission order. A job's failure is
//! delivered through its own reply channel and never stops the worker, which
//! is what keeps one bad command from poisoning every operation behind it.

use crate::core::FtpBridgeError;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// A type-erased unit of work. The typed result travels through a `oneshot`
/// captured inside the job, which keeps the channel itself monomorphic.
type QueuedJob = BoxFuture<'static, ()>;

#[derive(Debug)]
pub struct OperationQueue {
    jobs_tx: mpsc::UnboundedSender<QueuedJob>,
    worker: JoinHandle<()>,
}

impl OperationQueue {
    /// Creates a queue and spawns its worker. `label` identifies the owning
    /// connection in logs.
    pub fn new(label: String) -> Self {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<QueuedJob>();
        let worker = tokio::spawn(async move {
            while let Some(job) = jobs_rx.recv().await {
                job.await;
            }
            debug!("Operation queue for {label} closed.");
        });
        Self { jobs_tx, worker }
    }

    /// Submits an operation. Submission order is the order of `enqueue` calls,
    /// not of first polls: the job enters the FIFO synchronously and the
    /// returned future only awaits its completion.
    pub fn enqueue<T, F>(
        &self,
        op: F,
    ) -> impl Future<Output = Result<T, FtpBridgeError>> + Send + use<T, F>
    where
        F: Future<Output = Result<T, FtpBridgeError>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: QueuedJob = Box::pin(async move {
            // The submitter may have given up waiting; the send failing is fine.
            let _ = done_tx.send(op.await);
        });
        let submitted = self.jobs_tx.send(job).is_ok();

        async move {
            if !submitted {
                return Err(FtpBridgeError::OperationFailed(
                    "operation queue is closed".into(),
                ));
            }
            done_rx.await.map_err(|_| {
                FtpBridgeError::OperationFailed(
                    "operation abandoned: its queue was reset".into(),
                )
            })?
        }
    }

    /// Stops the worker immediately, abandoning queued and in-flight jobs.
    /// Used when a reconnect replaces the chain or a record is removed.
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
