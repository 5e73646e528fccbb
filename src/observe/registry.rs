// src/observe/registry.rs

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use crate::errors::{OpQueueError, Result};
use crate::sync::lock;

use super::PropertyChange;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// A listener that can be attached to any number of operations and queues.
///
/// Cloning yields a handle to the same listener; attaching a clone to a
/// subject the listener already observes is a no-op.
#[derive(Debug, Clone)]
pub struct PropertyObserver {
    id: u64,
    tx: mpsc::UnboundedSender<PropertyChange>,
}

impl PropertyObserver {
    /// Create an observer whose changes are read from the returned receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PropertyChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Self {
            id: NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        };
        (observer, rx)
    }

    /// Create an observer that invokes `callback` for every change.
    ///
    /// The callback runs on a dedicated tokio task, in delivery order, and
    /// should not block for long. Requires a running tokio runtime.
    pub fn from_fn<F>(callback: F) -> Result<Self>
    where
        F: Fn(PropertyChange) + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| OpQueueError::NoRuntime)?;
        let (observer, mut rx) = Self::channel();

        handle.spawn(async move {
            while let Some(change) = rx.recv().await {
                callback(change);
            }
        });

        Ok(observer)
    }

    fn deliver(&self, change: PropertyChange) -> bool {
        self.tx.send(change).is_ok()
    }
}

/// Observers attached to one subject.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<PropertyObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, observer: &PropertyObserver) {
        let mut observers = lock(&self.observers);
        if !observers.iter().any(|o| o.id == observer.id) {
            observers.push(observer.clone());
        }
    }

    pub fn detach(&self, observer: &PropertyObserver) {
        lock(&self.observers).retain(|o| o.id != observer.id);
    }

    pub fn len(&self) -> usize {
        lock(&self.observers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue `change` for every attached observer.
    ///
    /// Never blocks. Observers whose receiving end is gone are dropped.
    pub fn emit(&self, change: PropertyChange) {
        let mut observers = lock(&self.observers);
        if observers.is_empty() {
            return;
        }

        let before = observers.len();
        observers.retain(|o| o.deliver(change.clone()));
        let pruned = before - observers.len();
        if pruned > 0 {
            trace!(pruned, subject = %change.subject, "dropped closed property observers");
        }
    }
}
