#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use opqueue::{Operation, Spawner, TokioSpawner};

pub use opqueue_test_utils::builders;
pub use opqueue_test_utils::{
    ConcurrencyProbe, DeferredSpawner, RecordingObserver, init_tracing, with_timeout,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn tokio_spawner() -> Arc<dyn Spawner> {
    Arc::new(TokioSpawner::current().expect("tests run inside a tokio runtime"))
}

/// Poll `cond` every millisecond until it holds (bounded by `with_timeout`).
pub async fn eventually<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
}

/// Wait for `op` to reach `Executing`.
pub async fn wait_executing(op: &Operation) {
    eventually(|| op.is_executing()).await
}
