// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Usage errors (`AlreadySubmitted`, `DependenciesSealed`, `NotReady`,
//! `AlreadyFinished`) are returned at the point of misuse and never leave a
//! queue or operation half-updated. Cancellation is not an error.

use thiserror::Error;

use crate::types::OperationId;

#[derive(Error, Debug)]
pub enum OpQueueError {
    #[error("operation {0} was already submitted to a queue")]
    AlreadySubmitted(OperationId),

    #[error("dependencies of operation {0} can no longer change (submitted or started)")]
    DependenciesSealed(OperationId),

    #[error("operation {0} cannot depend on itself")]
    SelfDependency(OperationId),

    #[error("operation {0} is not ready and cannot be started")]
    NotReady(OperationId),

    #[error("operation {0} has already finished")]
    AlreadyFinished(OperationId),

    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),

    #[error("no tokio runtime available to spawn operation work")]
    NoRuntime,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in operation dependencies: {0}")]
    DagCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OpQueueError {
    /// Whether this error reports API misuse on an operation or queue (as
    /// opposed to configuration or IO failures).
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            OpQueueError::AlreadySubmitted(_)
                | OpQueueError::DependenciesSealed(_)
                | OpQueueError::SelfDependency(_)
                | OpQueueError::NotReady(_)
                | OpQueueError::AlreadyFinished(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OpQueueError>;
