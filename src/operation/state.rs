// src/operation/state.rs

//! Lifecycle state of a single operation.

use std::fmt;

use crate::observe::Property;

/// Lifecycle state of an operation.
///
/// Moves only forward: `Ready -> Executing -> Finished`, or directly
/// `Ready -> Finished` when the operation was cancelled before it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// Initial state; eligible to start once dependencies are satisfied.
    Ready,
    /// The work body is in progress.
    Executing,
    /// Terminal.
    Finished,
}

impl OperationState {
    /// The boolean property that is `true` while in this state.
    pub fn property(self) -> Property {
        match self {
            OperationState::Ready => Property::Ready,
            OperationState::Executing => Property::Executing,
            OperationState::Finished => Property::Finished,
        }
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(self, next: OperationState) -> bool {
        matches!(
            (self, next),
            (OperationState::Ready, OperationState::Executing)
                | (OperationState::Ready, OperationState::Finished)
                | (OperationState::Executing, OperationState::Finished)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == OperationState::Finished
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::Ready => "ready",
            OperationState::Executing => "executing",
            OperationState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Compare-and-set on a state slot.
///
/// Succeeds only when the slot currently holds `expected` and the move to
/// `next` is legal; otherwise returns the state actually found.
pub(crate) fn compare_and_set(
    slot: &mut OperationState,
    expected: OperationState,
    next: OperationState,
) -> Result<(), OperationState> {
    if *slot != expected || !expected.can_transition_to(next) {
        return Err(*slot);
    }
    *slot = next;
    Ok(())
}
