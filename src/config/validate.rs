// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{OpQueueError, Result};
use crate::queue::config::validate_max_concurrent;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = OpQueueError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.queue, raw.operation))
    }
}

/// Plan-level checks. Queues themselves never look for cycles; a plan is
/// rejected up front so that the demo runner cannot starve.
pub fn validate_plan(cfg: &RawPlanFile) -> Result<()> {
    ensure_has_operations(cfg)?;
    validate_queue_section(cfg)?;
    validate_operation_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_operations(cfg: &RawPlanFile) -> Result<()> {
    if cfg.operation.is_empty() {
        return Err(OpQueueError::ConfigError(
            "plan must contain at least one [operation.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_queue_section(cfg: &RawPlanFile) -> Result<()> {
    validate_max_concurrent(cfg.queue.max_concurrent).map_err(|_| {
        OpQueueError::ConfigError(format!(
            "[queue].max_concurrent must be >= 1 (got {})",
            cfg.queue.max_concurrent
        ))
    })
}

fn validate_operation_dependencies(cfg: &RawPlanFile) -> Result<()> {
    for (name, op) in cfg.operation.iter() {
        for dep in op.after.iter() {
            if dep == name {
                return Err(OpQueueError::ConfigError(format!(
                    "operation '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.operation.contains_key(dep) {
                return Err(OpQueueError::ConfigError(format!(
                    "operation '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawPlanFile) -> Result<()> {
    // Edge direction: dep -> operation.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.operation.keys() {
        graph.add_node(name.as_str());
    }

    for (name, op) in cfg.operation.iter() {
        for dep in op.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(OpQueueError::DagCycle(format!(
            "cycle detected in plan involving operation '{}'",
            cycle.node_id()
        ))),
    }
}
