// src/exec/mod.rs

//! Execution facilities injected into operations and queues.
//!
//! - [`spawner`] provides the `Spawner` trait and the tokio-backed
//!   `TokioSpawner` used in production, which tests can replace.

pub mod spawner;

pub use spawner::{BlockingJob, Spawner, TokioSpawner};
