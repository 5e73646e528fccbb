// src/operation/work.rs

//! The two execution styles of an operation.
//!
//! Both are reached through the same entry point ([`Operation::start`]) and
//! both end by calling `finish()` exactly once:
//!
//! - [`Work::Blocking`]: the caller of `start` runs the body and stays busy
//!   until it returns.
//! - [`Work::HandOff`]: `start` publishes `Executing`, gives the body to a
//!   [`Spawner`] and returns. The handed-off context checks cancellation
//!   before running the body.
//!
//! A body that panics is logged and the operation still finishes.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::exec::Spawner;
use crate::types::{ExecutionStyle, OperationId};

use super::Operation;

/// Body of a blocking operation.
pub type BlockingBody = Box<dyn FnOnce(&OperationContext) + Send + 'static>;

/// Body of a hand-off operation: builds the future that does the work.
pub type HandOffBody = Box<dyn FnOnce(OperationContext) -> BoxFuture<'static, ()> + Send + 'static>;

/// What a work body sees of its operation.
///
/// Long-running bodies should call [`is_cancelled`](Self::is_cancelled) at
/// natural checkpoints and return early once it reports `true`. Bodies never
/// change the operation state themselves.
#[derive(Clone)]
pub struct OperationContext {
    operation: Operation,
}

impl OperationContext {
    pub(crate) fn new(operation: Operation) -> Self {
        Self { operation }
    }

    pub fn is_cancelled(&self) -> bool {
        self.operation.is_cancelled()
    }

    pub fn id(&self) -> OperationId {
        self.operation.id()
    }

    pub fn name(&self) -> Option<String> {
        self.operation.name()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("id", &self.operation.id())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Work body plus the style it runs in.
pub(crate) enum Work {
    Blocking(BlockingBody),
    HandOff {
        spawner: Arc<dyn Spawner>,
        body: HandOffBody,
    },
}

impl Work {
    pub(crate) fn blocking<F>(body: F) -> Self
    where
        F: FnOnce(&OperationContext) + Send + 'static,
    {
        Work::Blocking(Box::new(body))
    }

    pub(crate) fn hand_off<F, Fut>(spawner: Arc<dyn Spawner>, body: F) -> Self
    where
        F: FnOnce(OperationContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Work::HandOff {
            spawner,
            body: Box::new(move |ctx| body(ctx).boxed()),
        }
    }

    pub(crate) fn style(&self) -> ExecutionStyle {
        match self {
            Work::Blocking(_) => ExecutionStyle::Blocking,
            Work::HandOff { .. } => ExecutionStyle::HandOff,
        }
    }

    /// Run the work for an operation that has just become `Executing`.
    ///
    /// Blocking work returns after the body returned and the operation
    /// finished. Hand-off work returns as soon as the body is spawned.
    pub(crate) fn run(self, operation: Operation) {
        match self {
            Work::Blocking(body) => {
                let ctx = OperationContext::new(operation.clone());
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| body(&ctx))) {
                    log_panic(&operation, payload.as_ref());
                }
                drop(ctx);
                operation.finish();
            }
            Work::HandOff { spawner, body } => {
                let op = operation.clone();
                spawner.spawn(
                    async move {
                        run_handed_off(op, body).await;
                    }
                    .boxed(),
                );
                debug!(op = %operation.label(), "work handed off");
            }
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Work::Blocking(_) => f.write_str("Work::Blocking"),
            Work::HandOff { spawner, .. } => f
                .debug_struct("Work::HandOff")
                .field("spawner", spawner)
                .finish_non_exhaustive(),
        }
    }
}

async fn run_handed_off(operation: Operation, body: HandOffBody) {
    if operation.is_cancelled() {
        debug!(
            op = %operation.label(),
            "cancelled before handed-off work began; skipping body"
        );
        operation.finish();
        return;
    }

    let ctx = OperationContext::new(operation.clone());
    match catch_unwind(AssertUnwindSafe(|| body(ctx))) {
        Ok(fut) => {
            if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
                log_panic(&operation, payload.as_ref());
            }
        }
        Err(payload) => log_panic(&operation, payload.as_ref()),
    }

    operation.finish();
}

fn log_panic(operation: &Operation, payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    error!(
        op = %operation.label(),
        panic = %message,
        "work body panicked; finishing operation"
    );
}
