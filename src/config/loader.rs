// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::Result;

/// Read and deserialize a plan file without semantic validation.
/// Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

pub fn parse_str(contents: &str) -> Result<RawPlanFile> {
    let plan: RawPlanFile = toml::from_str(contents)?;
    Ok(plan)
}

/// Load a plan file and validate it:
///
/// - at least one operation,
/// - `[queue].max_concurrent >= 1`,
/// - no unknown or self references in `after`,
/// - no dependency cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    let plan = PlanFile::try_from(raw)?;
    debug!(
        path = %path.as_ref().display(),
        operations = plan.operation.len(),
        "plan loaded"
    );
    Ok(plan)
}

/// `Opqueue.toml` in the current working directory.
pub fn default_plan_path() -> PathBuf {
    PathBuf::from("Opqueue.toml")
}
