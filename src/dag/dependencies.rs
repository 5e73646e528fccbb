// src/dag/dependencies.rs

//! Per-operation predecessor set.

use tracing::debug;

use crate::errors::{OpQueueError, Result};
use crate::operation::{Operation, OperationState};
use crate::types::OperationId;

/// Operations that must reach `Finished` before the owner may be admitted.
///
/// A dependency is satisfied by `Finished` alone: a cancelled predecessor
/// satisfies its dependents just like one that ran to completion.
///
/// The set is sealed when the owner is submitted to a queue or started; after
/// that it is read-only. Cycles are not detected here: a cycle leaves every
/// member of it waiting forever (see [`DependencyGraph`](super::DependencyGraph)
/// for an offline check).
#[derive(Debug, Default)]
pub struct Dependencies {
    ops: Vec<Operation>,
    sealed: bool,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `dependency` for `owner`. Returns `false` if it was already present.
    pub fn add(&mut self, owner: OperationId, dependency: &Operation) -> Result<bool> {
        self.ensure_open(owner)?;

        if dependency.id() == owner {
            return Err(OpQueueError::SelfDependency(owner));
        }
        if self.contains(dependency.id()) {
            return Ok(false);
        }

        debug!(%owner, dependency = %dependency.id(), "dependency added");
        self.ops.push(dependency.clone());
        Ok(true)
    }

    /// Remove `dependency`. Returns `false` if it was not present.
    pub fn remove(&mut self, owner: OperationId, dependency: &Operation) -> Result<bool> {
        self.ensure_open(owner)?;

        let before = self.ops.len();
        self.ops.retain(|op| op.id() != dependency.id());
        Ok(self.ops.len() != before)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.ops.iter().any(|op| op.id() == id)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }

    /// Whether every predecessor has reached `Finished`.
    pub fn all_finished(&self) -> bool {
        self.ops.iter().all(|op| op.state() == OperationState::Finished)
    }

    /// Predecessors that have not finished yet.
    pub fn unfinished(&self) -> Vec<Operation> {
        self.ops
            .iter()
            .filter(|op| op.state() != OperationState::Finished)
            .cloned()
            .collect()
    }

    fn ensure_open(&self, owner: OperationId) -> Result<()> {
        if self.sealed {
            return Err(OpQueueError::DependenciesSealed(owner));
        }
        Ok(())
    }
}
