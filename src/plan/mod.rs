// src/plan/mod.rs

//! Turn a validated [`PlanFile`] into a queue of simulated operations and
//! run it.
//!
//! Every plan operation sleeps for its configured duration in
//! `checkpoints` slices and checks for cancellation before each slice, so
//! cancellation (up front, delayed, or after a timeout) takes effect at the
//! next slice boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{OperationConfig, PlanFile};
use crate::errors::Result;
use crate::exec::{Spawner, TokioSpawner};
use crate::observe::{Property, PropertyChange, PropertyObserver};
use crate::operation::{Operation, OperationContext};
use crate::queue::OperationQueue;
use crate::types::ExecutionStyle;

/// Operations and queue built from a plan, not yet submitted.
#[derive(Debug)]
pub struct BuiltPlan {
    pub queue: OperationQueue,
    /// Operations keyed by plan name.
    pub operations: BTreeMap<String, Operation>,
    configs: BTreeMap<String, OperationConfig>,
    completed: BTreeMap<String, Arc<AtomicBool>>,
}

/// Outcome of one plan operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub name: String,
    pub finished: bool,
    pub cancelled: bool,
    /// The body ran through every checkpoint without seeing cancellation.
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanReport {
    /// The wait timed out and the remaining operations were cancelled.
    pub timed_out: bool,
    pub operations: Vec<OperationReport>,
}

impl PlanReport {
    pub fn get(&self, name: &str) -> Option<&OperationReport> {
        self.operations.iter().find(|r| r.name == name)
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "opqueue report (timed_out: {})", self.timed_out)?;
        for r in &self.operations {
            writeln!(
                f,
                "  - {}: finished={} cancelled={} completed={}",
                r.name, r.finished, r.cancelled, r.completed
            )?;
        }
        Ok(())
    }
}

/// Build the queue and operations of `plan` on the current tokio runtime.
pub fn build(plan: &PlanFile) -> Result<BuiltPlan> {
    let spawner: Arc<dyn Spawner> = Arc::new(TokioSpawner::current()?);
    build_with_spawner(plan, spawner)
}

/// Build the queue and operations of `plan`, starting work on `spawner`.
pub fn build_with_spawner(plan: &PlanFile, spawner: Arc<dyn Spawner>) -> Result<BuiltPlan> {
    let queue = OperationQueue::with_spawner(plan.queue.to_queue_config(), Arc::clone(&spawner))?;

    let mut operations = BTreeMap::new();
    let mut completed = BTreeMap::new();
    for (name, cfg) in &plan.operation {
        let done = Arc::new(AtomicBool::new(false));
        let op = build_operation(name, cfg, Arc::clone(&spawner), Arc::clone(&done));
        operations.insert(name.clone(), op);
        completed.insert(name.clone(), done);
    }

    for (name, cfg) in &plan.operation {
        let Some(op) = operations.get(name) else {
            continue;
        };
        for dep in &cfg.after {
            if let Some(dep_op) = operations.get(dep) {
                op.add_dependency(dep_op)?;
            }
        }
    }

    debug!(operations = operations.len(), "plan built");

    Ok(BuiltPlan {
        queue,
        operations,
        configs: plan.operation.clone(),
        completed,
    })
}

fn build_operation(
    name: &str,
    cfg: &OperationConfig,
    spawner: Arc<dyn Spawner>,
    completed: Arc<AtomicBool>,
) -> Operation {
    let slices = cfg.checkpoints.max(1);
    let slice = Duration::from_millis(cfg.duration_ms) / slices;
    let builder = Operation::builder().name(name).priority(cfg.priority);

    match cfg.style {
        ExecutionStyle::Blocking => builder.blocking(move |ctx: &OperationContext| {
            for _ in 0..slices {
                if ctx.is_cancelled() {
                    return;
                }
                std::thread::sleep(slice);
            }
            completed.store(!ctx.is_cancelled(), Ordering::SeqCst);
        }),
        ExecutionStyle::HandOff => builder.hand_off(spawner, move |ctx: OperationContext| async move {
            for _ in 0..slices {
                if ctx.is_cancelled() {
                    return;
                }
                tokio::time::sleep(slice).await;
            }
            completed.store(!ctx.is_cancelled(), Ordering::SeqCst);
        }),
    }
}

/// Observer that logs every change of the plan's operations and queue.
pub fn logging_observer() -> Result<PropertyObserver> {
    PropertyObserver::from_fn(|change: PropertyChange| match change.property {
        Property::Cancelled | Property::Suspended => info!(%change, "property changed"),
        _ => debug!(%change, "property changed"),
    })
}

/// Submit the plan, apply cancellations, wait, and report.
///
/// With a `timeout`, whatever is still unfinished when it elapses is
/// cancelled and the run waits for those operations to wind down.
pub async fn execute(built: BuiltPlan, timeout: Option<Duration>) -> Result<PlanReport> {
    let observer = logging_observer()?;
    built.queue.add_observer(&observer);
    for op in built.operations.values() {
        op.add_observer(&observer);
    }

    for (name, cfg) in &built.configs {
        if cfg.cancel {
            if let Some(op) = built.operations.get(name) {
                op.cancel();
            }
        }
    }

    built.queue.submit_all(built.operations.values())?;
    info!(
        queue = %built.queue.label(),
        operations = built.operations.len(),
        "plan submitted"
    );

    for (name, cfg) in &built.configs {
        if let (Some(delay), Some(op)) = (cfg.cancel_after_ms, built.operations.get(name)) {
            let op = op.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                op.cancel();
            });
        }
    }

    // A suspended plan queue holds everything back until the whole plan,
    // including its delayed cancellations, is in place.
    if built.queue.is_suspended() {
        built.queue.set_suspended(false);
    }

    let timed_out = !built.queue.wait_until_all_finished(timeout).await;
    if timed_out {
        warn!(queue = %built.queue.label(), ?timeout, "plan timed out; cancelling remaining operations");
        built.queue.cancel_all();
        built.queue.wait_until_all_finished(None).await;
    }

    let operations = built
        .operations
        .iter()
        .map(|(name, op)| OperationReport {
            name: name.clone(),
            finished: op.is_finished(),
            cancelled: op.is_cancelled(),
            completed: built
                .completed
                .get(name)
                .is_some_and(|flag| flag.load(Ordering::SeqCst)),
        })
        .collect();

    Ok(PlanReport {
        timed_out,
        operations,
    })
}
