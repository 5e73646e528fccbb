use std::sync::Mutex;

use futures::future::BoxFuture;
use opqueue::Spawner;
use opqueue::exec::BlockingJob;

/// Spawner that parks everything it is given until the test releases it.
///
/// Used as the hand-off spawner of an operation so that a test can act
/// (e.g. cancel) between `start()` returning and the handed-off body
/// running.
#[derive(Default)]
pub struct DeferredSpawner {
    futures: Mutex<Vec<BoxFuture<'static, ()>>>,
    jobs: Mutex<Vec<BlockingJob>>,
}

impl DeferredSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parked futures and jobs.
    pub fn parked(&self) -> usize {
        self.futures.lock().unwrap().len() + self.jobs.lock().unwrap().len()
    }

    /// Hand every parked future to the current tokio runtime and run every
    /// parked blocking job on its blocking pool.
    pub fn release_all(&self) {
        let futures: Vec<_> = self.futures.lock().unwrap().drain(..).collect();
        for fut in futures {
            tokio::spawn(fut);
        }
        let jobs: Vec<_> = self.jobs.lock().unwrap().drain(..).collect();
        for job in jobs {
            tokio::task::spawn_blocking(job);
        }
    }

    /// Drive every parked future to completion on the calling task.
    pub async fn run_all(&self) {
        let futures: Vec<_> = self.futures.lock().unwrap().drain(..).collect();
        for fut in futures {
            fut.await;
        }
    }
}

impl std::fmt::Debug for DeferredSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredSpawner")
            .field("parked", &self.parked())
            .finish()
    }
}

impl Spawner for DeferredSpawner {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        self.futures.lock().unwrap().push(fut);
    }

    fn spawn_blocking(&self, job: BlockingJob) {
        self.jobs.lock().unwrap().push(job);
    }
}
