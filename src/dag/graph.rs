// src/dag/graph.rs

use std::collections::{BTreeMap, HashSet};

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::errors::{OpQueueError, Result};
use crate::operation::Operation;
use crate::types::OperationId;

/// Internal node structure: the operation plus immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    operation: Operation,
    deps: Vec<OperationId>,
    dependents: Vec<OperationId>,
}

/// Snapshot of the dependency edges between a set of operations.
///
/// Queues never consult this: they only check "all dependencies finished"
/// when admitting. The graph exists for diagnostics, e.g. to find the cycle
/// that keeps a group of operations waiting forever, or to list operations
/// in an order that respects their dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<OperationId, DagNode>,
}

impl DependencyGraph {
    /// Build the graph reachable from `roots` through declared dependencies.
    pub fn from_operations<'a, I>(roots: I) -> Self
    where
        I: IntoIterator<Item = &'a Operation>,
    {
        let mut nodes: BTreeMap<OperationId, DagNode> = BTreeMap::new();
        let mut stack: Vec<Operation> = roots.into_iter().cloned().collect();

        // First pass: discover every operation and its dependency list.
        while let Some(op) = stack.pop() {
            if nodes.contains_key(&op.id()) {
                continue;
            }
            let deps = op.dependencies();
            nodes.insert(
                op.id(),
                DagNode {
                    operation: op,
                    deps: deps.iter().map(Operation::id).collect(),
                    dependents: Vec::new(),
                },
            );
            stack.extend(deps);
        }

        // Second pass: populate dependents based on deps.
        let edges: Vec<(OperationId, OperationId)> = nodes
            .iter()
            .flat_map(|(id, node)| node.deps.iter().map(move |dep| (*dep, *id)))
            .collect();
        for (dep, dependent) in edges {
            if let Some(node) = nodes.get_mut(&dep) {
                node.dependents.push(dependent);
            }
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.nodes.get(&id).map(|n| &n.operation)
    }

    /// Immediate dependencies of `id`.
    pub fn dependencies_of(&self, id: OperationId) -> &[OperationId] {
        self.nodes
            .get(&id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of `id`.
    pub fn dependents_of(&self, id: OperationId) -> &[OperationId] {
        self.nodes
            .get(&id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Operations without dependencies.
    pub fn roots(&self) -> Vec<OperationId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.deps.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Operations that sit on a dependency cycle, grouped per cycle.
    pub fn cycles(&self) -> Vec<Vec<OperationId>> {
        let graph = self.as_graphmap();
        kosaraju_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|id| graph.contains_edge(*id, *id))
            })
            .map(|mut component| {
                component.sort();
                component
            })
            .collect()
    }

    /// Operations ordered so that every dependency comes before its dependents.
    pub fn topological_order(&self) -> Result<Vec<Operation>> {
        let graph = self.as_graphmap();
        match toposort(&graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|id| self.operation(id).cloned())
                .collect()),
            Err(cycle) => {
                let label = self
                    .operation(cycle.node_id())
                    .map(Operation::label)
                    .unwrap_or_else(|| cycle.node_id().to_string());
                Err(OpQueueError::DagCycle(format!(
                    "cycle detected in operation dependencies involving '{label}'"
                )))
            }
        }
    }

    /// Every operation that transitively depends on `id`.
    pub fn transitive_dependents(&self, id: OperationId) -> HashSet<OperationId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<OperationId> = self.dependents_of(id).to_vec();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend_from_slice(self.dependents_of(next));
            }
        }
        seen
    }

    // Edge direction: dep -> dependent.
    fn as_graphmap(&self) -> DiGraphMap<OperationId, ()> {
        let mut graph = DiGraphMap::new();
        for id in self.nodes.keys() {
            graph.add_node(*id);
        }
        for (id, node) in &self.nodes {
            for dep in &node.deps {
                graph.add_edge(*dep, *id, ());
            }
        }
        graph
    }
}
