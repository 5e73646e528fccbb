// src/operation/builder.rs

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::exec::Spawner;
use crate::types::QueuePriority;

use super::work::{OperationContext, Work};
use super::{Completion, Operation};

/// Fluent constructor for [`Operation`].
///
/// ```
/// use opqueue::{Operation, QueuePriority};
///
/// let fetch = Operation::blocking(|_| {});
/// let parse = Operation::builder()
///     .name("parse")
///     .priority(QueuePriority::High)
///     .after(&fetch)
///     .blocking(|ctx| {
///         if ctx.is_cancelled() {
///             return;
///         }
///     });
///
/// assert_eq!(parse.dependencies(), vec![fetch]);
/// ```
#[derive(Default)]
pub struct OperationBuilder {
    name: Option<String>,
    priority: QueuePriority,
    after: Vec<Operation>,
    completion: Option<Completion>,
}

impl OperationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn priority(mut self, priority: QueuePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Wait for `dependency` to finish before this operation may be admitted.
    pub fn after(mut self, dependency: &Operation) -> Self {
        if !self.after.iter().any(|op| op.id() == dependency.id()) {
            self.after.push(dependency.clone());
        }
        self
    }

    /// Callback run once the operation has finished, see
    /// [`Operation::set_completion`].
    pub fn completion<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Operation) + Send + 'static,
    {
        self.completion = Some(Box::new(callback));
        self
    }

    pub fn blocking<F>(self, body: F) -> Operation
    where
        F: FnOnce(&OperationContext) + Send + 'static,
    {
        self.build(Work::blocking(body))
    }

    pub fn hand_off<F, Fut>(self, spawner: Arc<dyn Spawner>, body: F) -> Operation
    where
        F: FnOnce(OperationContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.build(Work::hand_off(spawner, body))
    }

    fn build(self, work: Work) -> Operation {
        let op = Operation::from_parts(work, self.name, self.priority);
        for dependency in &self.after {
            // A fresh operation is neither sealed nor one of its own dependencies.
            let _ = op.add_dependency(dependency);
        }
        if let Some(callback) = self.completion {
            let _ = op.set_completion(callback);
        }
        op
    }
}

impl fmt::Debug for OperationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationBuilder")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("after", &self.after)
            .field("completion", &self.completion.is_some())
            .finish()
    }
}
