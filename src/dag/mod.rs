// src/dag/mod.rs

//! Dependencies between operations.
//!
//! - [`dependencies`] holds the per-operation predecessor set that a queue
//!   consults before admitting an operation.
//! - [`graph`] builds a read-only snapshot of the edges between operations
//!   for diagnostics (cycle search, dependency-respecting order).

pub mod dependencies;
pub mod graph;

pub use dependencies::Dependencies;
pub use graph::DependencyGraph;
