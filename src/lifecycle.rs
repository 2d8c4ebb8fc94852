//! States a file passes through between submission and deletion
use crate::error::InvalidTransition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Decoded, no ID yet.
    Draft,
    Identified,
    /// Structural and temporal checks passed.
    Validated,
    Stored,
    /// Removed from the store. Terminal.
    Deleted,
}

impl FileState {
    /// Whether `self -> next` is an edge of the lifecycle.
    ///
    /// `Stored -> Validated` covers an explicit validation of a stored file; the
    /// file stays stored, the checks are simply re-run against its content.
    pub fn can_transition_to(self, next: FileState) -> bool {
        use FileState::*;

        matches!(
            (self, next),
            (Draft, Identified)
                | (Identified, Validated)
                | (Validated, Stored)
                | (Stored, Validated)
                | (Stored, Deleted)
        )
    }

    pub fn transition(self, next: FileState) -> Result<FileState, InvalidTransition> {
        if self.can_transition_to(next) {
            tracing::trace!(from = ?self, to = ?next, "file state transition");
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        self == FileState::Deleted
    }
}
