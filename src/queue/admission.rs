// src/queue/admission.rs

//! Pure admission policy.
//!
//! Given the members that are eligible right now and the number of free
//! slots, decide which ones start. No locks, no operations, no IO: the queue
//! gathers candidates inside its critical section and feeds them through
//! [`select`].

use crate::types::QueuePriority;

/// One eligible member, as seen by the admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Submission sequence number; lower was submitted earlier.
    pub seq: u64,
    pub priority: QueuePriority,
}

/// Pick up to `free_slots` candidates: highest priority first, then earliest
/// submission. Deterministic for a given input.
pub fn select(mut candidates: Vec<Candidate>, free_slots: usize) -> Vec<Candidate> {
    if free_slots == 0 || candidates.is_empty() {
        return Vec::new();
    }

    candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
    candidates.truncate(free_slots);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(seq: u64, priority: QueuePriority) -> Candidate {
        Candidate { seq, priority }
    }

    #[test]
    fn equal_priority_is_fifo() {
        let picked = select(
            vec![
                c(3, QueuePriority::Normal),
                c(1, QueuePriority::Normal),
                c(2, QueuePriority::Normal),
            ],
            2,
        );
        assert_eq!(picked, vec![c(1, QueuePriority::Normal), c(2, QueuePriority::Normal)]);
    }

    #[test]
    fn higher_priority_wins_over_earlier_submission() {
        let picked = select(
            vec![
                c(1, QueuePriority::Low),
                c(2, QueuePriority::Normal),
                c(3, QueuePriority::VeryHigh),
            ],
            1,
        );
        assert_eq!(picked, vec![c(3, QueuePriority::VeryHigh)]);
    }

    #[test]
    fn no_free_slots_selects_nothing() {
        assert!(select(vec![c(1, QueuePriority::High)], 0).is_empty());
    }

    #[test]
    fn fewer_candidates_than_slots() {
        let picked = select(vec![c(7, QueuePriority::Normal)], 4);
        assert_eq!(picked.len(), 1);
    }
}
