// src/config/mod.rs

//! Plan files for the demo runner.
//!
//! - `model.rs` holds the TOML-backed data model.
//! - `loader.rs` reads a plan from disk.
//! - `validate.rs` checks names, dependencies and cycles.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{OperationConfig, PlanFile, QueueSection, RawPlanFile};
pub use validate::validate_plan;
