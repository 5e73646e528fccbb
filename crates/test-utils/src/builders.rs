#![allow(dead_code)]

use opqueue::config::{OperationConfig, PlanFile, QueueSection, RawPlanFile};
use opqueue::{ExecutionStyle, QueuePriority};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                queue: QueueSection::default(),
                operation: Default::default(),
            },
        }
    }

    pub fn queue_name(mut self, name: &str) -> Self {
        self.plan.queue.name = Some(name.to_string());
        self
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.plan.queue.max_concurrent = n;
        self
    }

    pub fn suspended(mut self, val: bool) -> Self {
        self.plan.queue.suspended = val;
        self
    }

    pub fn with_operation(mut self, name: &str, op: OperationConfig) -> Self {
        self.plan.operation.insert(name.to_string(), op);
        self
    }

    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `OperationConfig`.
pub struct OperationConfigBuilder {
    op: OperationConfig,
}

impl OperationConfigBuilder {
    pub fn new() -> Self {
        Self {
            op: OperationConfig::default(),
        }
    }

    pub fn hand_off(mut self) -> Self {
        self.op.style = ExecutionStyle::HandOff;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.op.duration_ms = ms;
        self
    }

    pub fn checkpoints(mut self, n: u32) -> Self {
        self.op.checkpoints = n;
        self
    }

    pub fn priority(mut self, priority: QueuePriority) -> Self {
        self.op.priority = priority;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.op.after.push(dep.to_string());
        self
    }

    pub fn cancel(mut self, val: bool) -> Self {
        self.op.cancel = val;
        self
    }

    pub fn cancel_after_ms(mut self, ms: u64) -> Self {
        self.op.cancel_after_ms = Some(ms);
        self
    }

    pub fn build(self) -> OperationConfig {
        self.op
    }
}

impl Default for OperationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
