mod common;
use crate::common::builders::{OperationConfigBuilder, PlanFileBuilder};
use crate::common::{TestResult, init_tracing, with_timeout};

use std::io::Write;
use std::time::Duration;

use opqueue::config::{PlanFile, load_and_validate};
use opqueue::errors::OpQueueError;
use opqueue::{ExecutionStyle, QueuePriority, plan};
use tempfile::NamedTempFile;

fn write_plan(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp plan");
    file.write_all(contents.as_bytes()).expect("write temp plan");
    file
}

#[test]
fn loads_plan_from_disk() -> TestResult {
    let file = write_plan(
        r#"
[queue]
name = "example"
max_concurrent = 2

[operation.prepare]
duration_ms = 5

[operation.fetch]
style = "hand_off"
priority = "very_high"
checkpoints = 4
after = ["prepare"]
cancel_after_ms = 20
"#,
    );

    let plan = load_and_validate(file.path())?;

    assert_eq!(plan.queue.name.as_deref(), Some("example"));
    assert_eq!(plan.queue.max_concurrent, 2);
    let fetch = &plan.operation["fetch"];
    assert_eq!(fetch.style, ExecutionStyle::HandOff);
    assert_eq!(fetch.priority, QueuePriority::VeryHigh);
    assert_eq!(fetch.checkpoints, 4);
    assert_eq!(fetch.after, vec!["prepare".to_string()]);
    assert_eq!(fetch.cancel_after_ms, Some(20));

    let prepare = &plan.operation["prepare"];
    assert_eq!(prepare.style, ExecutionStyle::Blocking);
    assert_eq!(prepare.checkpoints, 1);
    Ok(())
}

#[test]
fn rejects_zero_capacity() {
    let file = write_plan("[queue]\nmax_concurrent = 0\n\n[operation.a]\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, OpQueueError::ConfigError(msg) if msg.contains("max_concurrent")));
}

#[test]
fn rejects_unknown_dependency() {
    let file = write_plan("[operation.a]\nafter = [\"ghost\"]\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, OpQueueError::ConfigError(msg) if msg.contains("ghost")));
}

#[test]
fn rejects_cycle() {
    let file = write_plan(
        "[operation.a]\nafter = [\"c\"]\n[operation.b]\nafter = [\"a\"]\n[operation.c]\nafter = [\"b\"]\n",
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, OpQueueError::DagCycle(_)));
}

#[test]
fn rejects_unknown_priority() {
    let file = write_plan("[operation.a]\npriority = \"urgent\"\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, OpQueueError::TomlError(_)));
}

#[test]
fn missing_file_is_io_error() {
    let err = load_and_validate("/definitely/not/here/Opqueue.toml").unwrap_err();
    assert!(matches!(err, OpQueueError::IoError(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn executes_plan_with_cancellations() -> TestResult {
    init_tracing();

    let plan_file: PlanFile = PlanFileBuilder::new()
        .queue_name("demo")
        .max_concurrent(2)
        .suspended(true)
        .with_operation("prepare", OperationConfigBuilder::new().duration_ms(5).build())
        .with_operation(
            "fetch",
            OperationConfigBuilder::new()
                .hand_off()
                .duration_ms(10)
                .after("prepare")
                .build(),
        )
        .with_operation("skipped", OperationConfigBuilder::new().cancel(true).build())
        .with_operation(
            "slow",
            OperationConfigBuilder::new()
                .duration_ms(5_000)
                .checkpoints(1_000)
                .cancel_after_ms(20)
                .build(),
        )
        .build();

    let built = plan::build(&plan_file)?;
    let report = with_timeout(plan::execute(built, None)).await?;

    assert!(!report.timed_out);
    assert!(report.operations.iter().all(|r| r.finished));

    let prepare = report.get("prepare").expect("prepare reported");
    assert!(prepare.completed && !prepare.cancelled);
    let fetch = report.get("fetch").expect("fetch reported");
    assert!(fetch.completed && !fetch.cancelled);
    let skipped = report.get("skipped").expect("skipped reported");
    assert!(skipped.cancelled && !skipped.completed);
    let slow = report.get("slow").expect("slow reported");
    assert!(slow.cancelled && !slow.completed);

    let text = report.to_string();
    assert!(text.contains("fetch: finished=true cancelled=false completed=true"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_cancels_what_is_left() -> TestResult {
    init_tracing();

    let plan_file = PlanFileBuilder::new()
        .with_operation(
            "forever",
            OperationConfigBuilder::new()
                .hand_off()
                .duration_ms(10_000)
                .checkpoints(10_000)
                .build(),
        )
        .with_operation(
            "after_forever",
            OperationConfigBuilder::new().after("forever").build(),
        )
        .build();

    let built = plan::build(&plan_file)?;
    let report = with_timeout(plan::execute(built, Some(Duration::from_millis(30)))).await?;

    assert!(report.timed_out);
    for r in &report.operations {
        assert!(r.finished, "{} should have finished", r.name);
        assert!(r.cancelled, "{} should have been cancelled", r.name);
        assert!(!r.completed);
    }
    Ok(())
}

#[test]
fn builder_rejects_invalid_plan() {
    let raw = PlanFileBuilder::new().max_concurrent(0).raw();
    assert!(PlanFile::try_from(raw).is_err());
}
