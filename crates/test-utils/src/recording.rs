use std::sync::Mutex;

use opqueue::{Property, PropertyChange, PropertyObserver, SubjectId};
use tokio::sync::mpsc::UnboundedReceiver;

/// Observer that keeps every change it receives, in delivery order.
pub struct RecordingObserver {
    observer: PropertyObserver,
    rx: Mutex<UnboundedReceiver<PropertyChange>>,
    seen: Mutex<Vec<PropertyChange>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        let (observer, rx) = PropertyObserver::channel();
        Self {
            observer,
            rx: Mutex::new(rx),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Handle to attach to operations and queues.
    pub fn observer(&self) -> &PropertyObserver {
        &self.observer
    }

    /// Every change delivered so far.
    pub fn changes(&self) -> Vec<PropertyChange> {
        let mut rx = self.rx.lock().unwrap();
        let mut seen = self.seen.lock().unwrap();
        while let Ok(change) = rx.try_recv() {
            seen.push(change);
        }
        seen.clone()
    }

    /// Changes of one subject.
    pub fn changes_for(&self, subject: SubjectId) -> Vec<PropertyChange> {
        self.changes()
            .into_iter()
            .filter(|c| c.subject == subject)
            .collect()
    }

    /// `(property, value)` of the boolean changes of one subject.
    pub fn flags_for(&self, subject: SubjectId) -> Vec<(Property, bool)> {
        self.changes_for(subject)
            .into_iter()
            .filter_map(|c| c.as_flag().map(|v| (c.property, v)))
            .collect()
    }

    /// Subjects that published `property = true`, in delivery order.
    pub fn subjects_with(&self, property: Property) -> Vec<SubjectId> {
        self.changes()
            .into_iter()
            .filter(|c| c.property == property && c.as_flag() == Some(true))
            .map(|c| c.subject)
            .collect()
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}
