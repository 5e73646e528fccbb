// src/lib.rs

//! Cancellable operations with dependencies, run on a concurrency-bounded
//! queue that admits work by priority, then submission order.
//!
//! - [`operation`] is the per-operation state machine.
//! - [`queue`] is the admission scheduler.
//! - [`observe`] delivers typed property-change notifications.
//! - [`exec`] abstracts where work runs.
//! - [`dag`] holds dependency sets and a diagnostic graph.
//! - [`config`], [`plan`], [`cli`] and [`logging`] make up the demo runner.

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod observe;
pub mod operation;
pub mod plan;
pub mod queue;
pub mod types;

mod sync;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

pub use crate::dag::DependencyGraph;
pub use crate::errors::OpQueueError;
pub use crate::exec::{Spawner, TokioSpawner};
pub use crate::observe::{Property, PropertyChange, PropertyObserver, PropertyValue, SubjectId};
pub use crate::operation::{Operation, OperationBuilder, OperationContext, OperationState};
pub use crate::queue::{OperationQueue, QueueConfig};
pub use crate::types::{ExecutionStyle, OperationId, QueueId, QueuePriority};

use crate::cli::CliArgs;
use crate::config::{PlanFile, load_and_validate};

/// High-level entry point used by `main.rs`: load the plan, then either
/// print it (`--dry-run`) or run it and print the report.
pub async fn run(args: CliArgs) -> Result<()> {
    let plan_path = PathBuf::from(&args.plan);
    let plan = load_and_validate(&plan_path)?;

    if args.dry_run {
        print_dry_run(&plan);
        return Ok(());
    }

    let built = plan::build(&plan)?;
    let report = plan::execute(built, args.timeout_ms.map(Duration::from_millis)).await?;
    print!("{report}");
    Ok(())
}

/// Print queue settings and operations without executing anything.
fn print_dry_run(plan: &PlanFile) {
    println!("opqueue dry-run");
    println!(
        "  queue.name = {}",
        plan.queue.name.as_deref().unwrap_or("<unnamed>")
    );
    println!("  queue.max_concurrent = {}", plan.queue.max_concurrent);
    println!("  queue.suspended = {}", plan.queue.suspended);
    println!();

    println!("operations ({}):", plan.operation.len());
    for (name, op) in plan.operation.iter() {
        println!("  - {name}");
        println!("      style: {:?}", op.style);
        println!("      priority: {}", op.priority);
        println!(
            "      duration_ms: {} in {} checkpoint(s)",
            op.duration_ms, op.checkpoints
        );
        if !op.after.is_empty() {
            println!("      after: {:?}", op.after);
        }
        if op.cancel {
            println!("      cancel: true");
        }
        if let Some(ms) = op.cancel_after_ms {
            println!("      cancel_after_ms: {ms}");
        }
    }

    debug!("dry-run complete (no execution)");
}
