mod common;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::time::Duration;

use opqueue::{OpQueueError, Operation, OperationQueue, QueueConfig};

fn sleeper(ms: u64) -> Operation {
    Operation::blocking(move |_| std::thread::sleep(Duration::from_millis(ms)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_times_out_then_succeeds() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(1))?;
    queue.submit(&sleeper(80))?;

    assert!(!queue.wait_until_all_finished(Some(Duration::from_millis(10))).await);
    assert!(queue.wait_until_all_finished(Some(Duration::from_secs(5))).await);
    assert_eq!(queue.operation_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_covers_operations_submitted_during_the_wait() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(1))?;
    queue.submit(&sleeper(40))?;

    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.wait_until_all_finished(None).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    let late = sleeper(40);
    queue.submit(&late)?;

    assert!(with_timeout(waiter).await?);
    assert!(late.is_finished());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submit_all_and_wait_returns_after_batch() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(2))?;
    let batch = vec![sleeper(5), sleeper(5), sleeper(5)];

    with_timeout(queue.submit_all_and_wait(&batch)).await?;

    assert!(batch.iter().all(Operation::is_finished));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn operation_wait_resolves_for_queued_operation() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(1))?;
    let op = sleeper(5);
    queue.submit(&op)?;

    with_timeout(op.wait_until_finished()).await;
    assert!(op.is_finished());
    Ok(())
}

#[tokio::test]
async fn resubmission_is_rejected() -> TestResult {
    let first = OperationQueue::new(QueueConfig::new(1).suspended(true))?;
    let second = OperationQueue::new(QueueConfig::new(1))?;
    let op = Operation::blocking(|_| {});

    first.submit(&op)?;
    let err = second.submit(&op).unwrap_err();

    assert!(matches!(err, OpQueueError::AlreadySubmitted(id) if id == op.id()));
    assert_eq!(second.operation_count(), 0);
    assert!(matches!(op.start(), Err(OpQueueError::AlreadySubmitted(_))));
    Ok(())
}

#[tokio::test]
async fn batch_with_finished_operation_enqueues_nothing() -> TestResult {
    let queue = OperationQueue::new(QueueConfig::new(1).suspended(true))?;
    let fresh = Operation::blocking(|_| {});
    let done = Operation::blocking(|_| {});
    done.start()?;

    let err = queue.submit_all([&fresh, &done]).unwrap_err();

    assert!(matches!(err, OpQueueError::NotReady(id) if id == done.id()));
    assert_eq!(queue.operation_count(), 0);
    assert!(!fresh.is_submitted());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_the_queue_handle_does_not_strand_work() -> TestResult {
    init_tracing();

    let first = sleeper(10);
    let second = sleeper(10);
    {
        let queue = OperationQueue::new(QueueConfig::new(1))?;
        queue.submit_all([&first, &second])?;
    }

    with_timeout(first.wait_until_finished()).await;
    with_timeout(second.wait_until_finished()).await;
    assert!(first.is_finished() && second.is_finished());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_queue_still_runs_dependents() -> TestResult {
    init_tracing();

    let upstream = sleeper(10);
    let downstream = Operation::builder().after(&upstream).blocking(|_| {});
    {
        let queue = OperationQueue::new(QueueConfig::new(2))?;
        queue.submit_all([&downstream, &upstream])?;
    }

    with_timeout(downstream.wait_until_finished()).await;
    assert!(upstream.is_finished());
    assert!(!downstream.is_cancelled());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_queue_waits_for_outside_dependency() -> TestResult {
    init_tracing();

    let outside = Operation::blocking(|_| {});
    let member = Operation::builder().after(&outside).blocking(|_| {});
    {
        let queue = OperationQueue::new(QueueConfig::new(1))?;
        queue.submit(&member)?;
    }

    outside.start()?;
    with_timeout(member.wait_until_finished()).await;
    assert!(member.is_finished());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_start_and_submit_never_leaves_a_phantom_member() -> TestResult {
    init_tracing();

    let queue = OperationQueue::new(QueueConfig::new(2))?;
    for _ in 0..100 {
        let op = Operation::blocking(|_| {});
        let starter = {
            let op = op.clone();
            std::thread::spawn(move || op.start().is_ok())
        };
        let submitted = queue.submit(&op).is_ok();
        let started = starter.join().expect("starter thread");

        assert!(submitted != started, "submitted={submitted} started={started}");
        with_timeout(op.wait_until_finished()).await;
    }

    assert!(queue.wait_until_all_finished(Some(Duration::from_secs(5))).await);
    assert_eq!(queue.operation_count(), 0);
    Ok(())
}
