mod common;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use opqueue::{DependencyGraph, OpQueueError, Operation, OperationQueue, QueueConfig};

fn logged(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Operation {
    let log = Arc::clone(log);
    let label = name.to_string();
    Operation::builder().name(name).blocking(move |_| {
        std::thread::sleep(Duration::from_millis(5));
        log.lock().unwrap().push(label);
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependent_waits_regardless_of_submission_order() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(4))?;
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = logged("a", &log);
    let b = logged("b", &log);
    b.add_dependency(&a)?;

    // Dependent first, with spare capacity.
    queue.submit(&b)?;
    queue.submit(&a)?;
    assert!(with_timeout(queue.wait_until_all_finished(None)).await);

    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn diamond_runs_join_last() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(4))?;
    let log = Arc::new(Mutex::new(Vec::new()));
    let root = logged("root", &log);
    let left = logged("left", &log);
    let right = logged("right", &log);
    let join = logged("join", &log);
    left.add_dependency(&root)?;
    right.add_dependency(&root)?;
    join.add_dependency(&left)?;
    join.add_dependency(&right)?;

    queue.submit_all([&join, &right, &left, &root])?;
    assert!(with_timeout(queue.wait_until_all_finished(None)).await);

    let order = log.lock().unwrap().clone();
    assert_eq!(order.first().map(String::as_str), Some("root"));
    assert_eq!(order.last().map(String::as_str), Some("join"));
    assert_eq!(order.len(), 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependency_in_another_queue_is_tracked() -> TestResult {
    init_tracing();

    let upstream = OperationQueue::new(QueueConfig::new(1).with_name("upstream").suspended(true))?;
    let downstream = OperationQueue::new(QueueConfig::new(1).with_name("downstream"))?;

    let a = Operation::builder().name("a").blocking(|_| {});
    let b = Operation::builder().name("b").after(&a).blocking(|_| {});

    downstream.submit(&b)?;
    upstream.submit(&a)?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(b.is_ready());
    assert_eq!(downstream.blocked_operations(), vec![b.clone()]);

    upstream.set_suspended(false);
    assert!(with_timeout(downstream.wait_until_all_finished(None)).await);
    assert!(a.is_finished());
    assert!(b.is_finished());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsubmitted_dependency_unblocks_when_started_directly() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(1))?;
    let a = Operation::blocking(|_| {});
    let b = Operation::builder().after(&a).blocking(|_| {});

    queue.submit(&b)?;
    assert!(!queue.wait_until_all_finished(Some(Duration::from_millis(20))).await);

    a.start()?;
    assert!(with_timeout(queue.wait_until_all_finished(None)).await);
    assert!(b.is_finished());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_dependency_still_counts_as_finished() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(2))?;
    let ran = Arc::new(Mutex::new(Vec::new()));
    let a = logged("a", &ran);
    let b = logged("b", &ran);
    b.add_dependency(&a)?;

    a.cancel();
    queue.submit_all([&a, &b])?;
    assert!(with_timeout(queue.wait_until_all_finished(None)).await);

    assert!(a.is_finished() && a.is_cancelled());
    assert!(b.is_finished() && !b.is_cancelled());
    assert_eq!(*ran.lock().unwrap(), vec!["b"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cycle_starves_and_is_inspectable() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(2))?;
    let a = Operation::builder().name("a").blocking(|_| {});
    let b = Operation::builder().name("b").blocking(|_| {});
    a.add_dependency(&b)?;
    b.add_dependency(&a)?;

    queue.submit_all([&a, &b])?;
    assert!(!queue.wait_until_all_finished(Some(Duration::from_millis(30))).await);

    let blocked = queue.blocked_operations();
    assert_eq!(blocked.len(), 2);
    assert!(a.is_ready() && b.is_ready());

    let graph = DependencyGraph::from_operations(&blocked);
    assert_eq!(graph.cycles().len(), 1);
    assert!(matches!(
        graph.topological_order(),
        Err(OpQueueError::DagCycle(_))
    ));
    Ok(())
}

#[tokio::test]
async fn dependencies_are_frozen_after_submission() -> TestResult {
    let queue = OperationQueue::new(QueueConfig::new(1).suspended(true))?;
    let a = Operation::blocking(|_| {});
    let b = Operation::blocking(|_| {});
    queue.submit(&b)?;

    let err = b.add_dependency(&a).unwrap_err();
    assert!(matches!(err, OpQueueError::DependenciesSealed(id) if id == b.id()));
    assert!(err.is_usage_error());
    assert!(b.dependencies().is_empty());
    Ok(())
}

#[test]
fn self_dependency_is_rejected() {
    let a = Operation::blocking(|_| {});
    assert!(matches!(
        a.add_dependency(&a),
        Err(OpQueueError::SelfDependency(_))
    ));
}
