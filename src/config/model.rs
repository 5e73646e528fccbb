// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::queue::QueueConfig;
use crate::types::{ExecutionStyle, QueuePriority};

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [queue]
/// name = "example"
/// max_concurrent = 2
///
/// [operation.prepare]
/// duration_ms = 10
///
/// [operation.fetch]
/// style = "hand_off"
/// priority = "high"
/// after = ["prepare"]
/// ```
///
/// Convert with `PlanFile::try_from` to get a validated plan.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub queue: QueueSection,

    /// All operations from `[operation.<name>]`, keyed by name.
    #[serde(default)]
    pub operation: BTreeMap<String, OperationConfig>,
}

/// `[queue]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Submit everything to a suspended queue and resume once all
    /// operations are in.
    #[serde(default)]
    pub suspended: bool,
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            name: None,
            max_concurrent: default_max_concurrent(),
            suspended: false,
        }
    }
}

impl QueueSection {
    pub fn to_queue_config(&self) -> QueueConfig {
        let mut cfg = QueueConfig::new(self.max_concurrent).suspended(self.suspended);
        cfg.name = self.name.clone();
        cfg
    }
}

/// `[operation.<name>]` section.
///
/// The body of a plan operation is simulated work: it sleeps for
/// `duration_ms`, split into `checkpoints` slices, and checks for
/// cancellation before each slice.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationConfig {
    #[serde(default)]
    pub style: ExecutionStyle,

    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default = "default_checkpoints")]
    pub checkpoints: u32,

    #[serde(default)]
    pub priority: QueuePriority,

    /// Operations that must finish before this one is admitted.
    #[serde(default)]
    pub after: Vec<String>,

    /// Cancel before the operation is submitted.
    #[serde(default)]
    pub cancel: bool,

    /// Cancel from outside this many milliseconds after submission.
    #[serde(default)]
    pub cancel_after_ms: Option<u64>,
}

fn default_checkpoints() -> u32 {
    1
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            style: ExecutionStyle::default(),
            duration_ms: 0,
            checkpoints: default_checkpoints(),
            priority: QueuePriority::default(),
            after: Vec::new(),
            cancel: false,
            cancel_after_ms: None,
        }
    }
}

/// Validated plan. Only obtainable through `TryFrom<RawPlanFile>`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub queue: QueueSection,
    pub operation: BTreeMap<String, OperationConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(
        queue: QueueSection,
        operation: BTreeMap<String, OperationConfig>,
    ) -> Self {
        Self { queue, operation }
    }
}
