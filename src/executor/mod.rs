//! Job execution: fire-and-forget dispatch and the completion signal the
//! run-once loop awaits.

pub mod local;

pub use local::LocalJobExecutor;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::{JobCancelMessage, JobRequestMessage};
use crate::error::Result;

/// Settable one-way latch signalling that the single dispatched job finished.
///
/// Only meaningful in run-once mode; in service mode nothing awaits it.
#[derive(Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the job complete. Idempotent.
    pub fn complete(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_complete(&self) -> bool {
        *self.tx.subscribe().borrow()
    }

    /// Resolve once `complete` has been called (possibly already).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs jobs independently of the fetch cycle.
///
/// `start` must return promptly in service mode; the job itself runs on a
/// task owned by the executor. Failures inside a job are the executor's
/// concern and never surface into the loop.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Dispatch a job. With `single_job` set the executor resolves the
    /// completion signal when this job finishes.
    async fn start(&self, request: JobRequestMessage, single_job: bool) -> Result<()>;

    /// Forward a cancellation to the named job, waiting up to its grace
    /// period before forcing termination.
    async fn cancel(&self, cancel: &JobCancelMessage) -> Result<()>;

    /// Signal resolved when the single dispatched job completes.
    fn completion_signal(&self) -> CompletionSignal;

    /// Cancel everything still running and wait for it to wind down.
    async fn shutdown(&self) -> Result<()>;
}
