// src/exec/spawner.rs

//! Pluggable execution facility.
//!
//! Operations and queues never reach for ambient, process-wide executors.
//! They are handed a [`Spawner`] instead:
//!
//! - a queue uses it to start admitted operations (blocking bodies occupy a
//!   blocking worker for their whole duration; hand-off operations only
//!   borrow a task long enough to publish `Executing`);
//! - a hand-off operation uses its own spawner to run its body after
//!   `start()` has returned.
//!
//! [`TokioSpawner`] is the production implementation. Tests can provide a
//! spawner that parks work until they release it.

use std::fmt;

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::errors::{OpQueueError, Result};

/// A job that blocks its worker until it returns.
pub type BlockingJob = Box<dyn FnOnce() + Send + 'static>;

/// Trait abstracting where operation work runs.
pub trait Spawner: Send + Sync + fmt::Debug {
    /// Run `work` on an independent execution context without waiting for it.
    fn spawn(&self, work: BoxFuture<'static, ()>);

    /// Run `job` on a worker that may block for the job's whole duration.
    fn spawn_blocking(&self, job: BlockingJob);
}

/// Spawner backed by a tokio runtime handle.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner for the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| OpQueueError::NoRuntime)
    }
}

impl Spawner for TokioSpawner {
    fn spawn(&self, work: BoxFuture<'static, ()>) {
        // Completion is reported through operation state, not the join handle.
        drop(self.handle.spawn(work));
    }

    fn spawn_blocking(&self, job: BlockingJob) {
        drop(self.handle.spawn_blocking(job));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn current_fails_outside_a_runtime() {
        assert!(matches!(TokioSpawner::current(), Err(OpQueueError::NoRuntime)));
    }

    #[tokio::test]
    async fn spawn_runs_future_in_background() {
        let spawner = TokioSpawner::current().unwrap();
        let (tx, rx) = oneshot::channel();

        spawner.spawn(Box::pin(async move {
            let _ = tx.send(42);
        }));

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawn_blocking_runs_job_on_worker() {
        let spawner = TokioSpawner::current().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        let flag = Arc::clone(&ran);
        spawner.spawn_blocking(Box::new(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(());
        }));

        rx.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
