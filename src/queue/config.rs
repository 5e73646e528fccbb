// src/queue/config.rs

use std::num::NonZero;

use crate::errors::{OpQueueError, Result};

/// Construction parameters for an [`OperationQueue`](super::OperationQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Diagnostic name.
    pub name: Option<String>,
    /// Maximum number of operations admitted at the same time (>= 1).
    pub max_concurrent: usize,
    /// Start suspended: nothing is admitted until resumed.
    pub suspended: bool,
}

impl QueueConfig {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            name: None,
            max_concurrent,
            suspended: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn suspended(mut self, suspended: bool) -> Self {
        self.suspended = suspended;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_max_concurrent(self.max_concurrent)
    }
}

/// One slot per available CPU, falling back to 1.
impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(
            std::thread::available_parallelism()
                .map(NonZero::get)
                .unwrap_or(1),
        )
    }
}

pub(crate) fn validate_max_concurrent(max_concurrent: usize) -> Result<()> {
    if max_concurrent == 0 {
        return Err(OpQueueError::InvalidConfig(
            "max_concurrent must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
