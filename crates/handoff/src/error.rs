//! Handoff errors.

use arkival_storage::StorageError;

use crate::synchronizer::Phase;

/// Error type for handoff operations.
pub type Result<T> = std::result::Result<T, HandoffError>;

/// Handoff errors.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// The outgoing commit failed; every store keeps its previous content
    #[error("partial update: handoff stores were not committed: {source}")]
    PartialSynchronization {
        /// Storage failure that aborted the commit
        #[source]
        source: StorageError,
    },

    /// An operation was called in the wrong phase
    #[error("cannot {operation} while {phase}")]
    InvalidTransition {
        /// Current phase
        phase: Phase,
        /// Attempted operation
        operation: &'static str,
    },

    /// The outgoing summary was empty
    #[error("session summary must not be empty")]
    EmptySummary,

    /// Reading a store failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
