// src/types.rs

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Process-unique identity of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(u64);

impl QueueId {
    pub(crate) fn next() -> Self {
        Self(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// Relative admission priority inside one queue.
///
/// Only orders admission among operations that are eligible at the same time;
/// a running operation is never preempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
    VeryHigh,
}

impl QueuePriority {
    pub(crate) fn as_i8(self) -> i8 {
        match self {
            QueuePriority::VeryLow => -8,
            QueuePriority::Low => -4,
            QueuePriority::Normal => 0,
            QueuePriority::High => 4,
            QueuePriority::VeryHigh => 8,
        }
    }

    pub(crate) fn from_i8(raw: i8) -> Self {
        match raw {
            i8::MIN..=-6 => QueuePriority::VeryLow,
            -5..=-2 => QueuePriority::Low,
            -1..=1 => QueuePriority::Normal,
            2..=5 => QueuePriority::High,
            _ => QueuePriority::VeryHigh,
        }
    }
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueuePriority::VeryLow => "very_low",
            QueuePriority::Low => "low",
            QueuePriority::Normal => "normal",
            QueuePriority::High => "high",
            QueuePriority::VeryHigh => "very_high",
        };
        f.write_str(s)
    }
}

impl FromStr for QueuePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "very_low" => Ok(QueuePriority::VeryLow),
            "low" => Ok(QueuePriority::Low),
            "normal" => Ok(QueuePriority::Normal),
            "high" => Ok(QueuePriority::High),
            "very_high" => Ok(QueuePriority::VeryHigh),
            other => Err(format!(
                "invalid priority: {other} (expected very_low, low, normal, high or very_high)"
            )),
        }
    }
}

/// How an operation's work body is run once it is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStyle {
    /// The worker calls the body directly and is occupied until it returns.
    #[default]
    Blocking,
    /// Starting publishes `Executing` and hands the body to another execution
    /// context, returning immediately.
    HandOff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_follows_levels() {
        assert!(QueuePriority::VeryHigh > QueuePriority::High);
        assert!(QueuePriority::High > QueuePriority::Normal);
        assert!(QueuePriority::Low > QueuePriority::VeryLow);
    }

    #[test]
    fn priority_survives_atomic_encoding() {
        for p in [
            QueuePriority::VeryLow,
            QueuePriority::Low,
            QueuePriority::Normal,
            QueuePriority::High,
            QueuePriority::VeryHigh,
        ] {
            assert_eq!(QueuePriority::from_i8(p.as_i8()), p);
        }
    }

    #[test]
    fn priority_parses_from_str() {
        assert_eq!("very-high".parse::<QueuePriority>(), Ok(QueuePriority::VeryHigh));
        assert_eq!(" Low ".parse::<QueuePriority>(), Ok(QueuePriority::Low));
        assert!("urgent".parse::<QueuePriority>().is_err());
    }

    #[test]
    fn ids_are_unique() {
        let a = OperationId::next();
        let b = OperationId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
