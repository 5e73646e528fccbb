// src/observe/mod.rs

//! Property-change notifications for operations and queues.
//!
//! Every tracked change is delivered as a typed [`PropertyChange`] record to
//! the [`PropertyObserver`]s attached to the subject. Delivery goes through an
//! unbounded channel, so emitting never blocks and never calls user code while
//! a lock is held.
//!
//! - [`registry`] holds the per-subject observer list and the observer handle.

pub mod registry;

use std::fmt;

use crate::types::{OperationId, QueueId};

pub use registry::{ObserverRegistry, PropertyObserver};

/// Which object a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectId {
    Operation(OperationId),
    Queue(QueueId),
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectId::Operation(id) => id.fmt(f),
            SubjectId::Queue(id) => id.fmt(f),
        }
    }
}

/// Observable properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    // Operation properties.
    Ready,
    Executing,
    Finished,
    Cancelled,
    // Shared by operations and queues.
    Name,
    // Queue properties.
    OperationCount,
    MaxConcurrentOperationCount,
    Suspended,
}

impl Property {
    /// Stable key used in logs.
    pub fn key(self) -> &'static str {
        match self {
            Property::Ready => "ready",
            Property::Executing => "executing",
            Property::Finished => "finished",
            Property::Cancelled => "cancelled",
            Property::Name => "name",
            Property::OperationCount => "operationCount",
            Property::MaxConcurrentOperationCount => "maxConcurrentOperationCount",
            Property::Suspended => "suspended",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// New value carried by a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Flag(bool),
    Count(usize),
    Name(Option<String>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Flag(b) => write!(f, "{b}"),
            PropertyValue::Count(n) => write!(f, "{n}"),
            PropertyValue::Name(Some(name)) => f.write_str(name),
            PropertyValue::Name(None) => f.write_str("<unnamed>"),
        }
    }
}

/// One delivered notification: `{subject, property, new value}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub subject: SubjectId,
    pub property: Property,
    pub value: PropertyValue,
}

impl PropertyChange {
    pub fn flag(subject: SubjectId, property: Property, value: bool) -> Self {
        Self {
            subject,
            property,
            value: PropertyValue::Flag(value),
        }
    }

    pub fn count(subject: SubjectId, property: Property, value: usize) -> Self {
        Self {
            subject,
            property,
            value: PropertyValue::Count(value),
        }
    }

    pub fn name(subject: SubjectId, value: Option<String>) -> Self {
        Self {
            subject,
            property: Property::Name,
            value: PropertyValue::Name(value),
        }
    }

    /// The boolean value, if this is a flag change.
    pub fn as_flag(&self) -> Option<bool> {
        match self.value {
            PropertyValue::Flag(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} = {}", self.subject, self.property, self.value)
    }
}
