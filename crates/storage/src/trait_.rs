//! Storage trait abstraction.

use std::path::PathBuf;

use arkival_core::{
    AgentHandoff, ChangelogEntry, ChangelogStore, CheckpointEntry, MissingDocsReport,
    ProjectSummary, SessionState,
};
use async_trait::async_trait;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document on disk matches no known schema
    #[error("{}: unrecognized document: {reason}", path.display())]
    Schema {
        /// Offending file
        path: PathBuf,
        /// What failed to parse
        reason: String,
    },

    /// Writing a single document failed after retries
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Target file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// A multi-file commit failed part way
    #[error("transaction failed writing {}: {source} (rolled back: {rolled_back})", path.display())]
    Transaction {
        /// File whose write failed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
        /// Whether every already-renamed file was restored
        rolled_back: bool,
    },
}

/// Everything one outgoing handoff writes.
#[derive(Debug, Clone)]
pub struct HandoffBatch {
    /// New session state
    pub session_state: SessionState,

    /// Handoff document regenerated from `session_state`
    pub handoff: AgentHandoff,

    /// Changelog including the new entry
    pub changelog: ChangelogStore,

    /// Entries moved out of the changelog by retention
    pub archived_entries: Vec<ChangelogEntry>,

    /// Section prepended to the checkpoint log
    pub checkpoint: CheckpointEntry,

    /// Sections kept in the checkpoint log
    pub checkpoint_retention: usize,
}

/// Storage abstraction for Arkival documents.
///
/// There is no single-store write for the handoff documents: they change
/// only through [`Storage::commit_handoff`].
#[async_trait]
pub trait Storage: Send + Sync {
    // === Summary ===

    /// Load the current project summary, migrating legacy documents.
    async fn load_summary(&self) -> Result<Option<ProjectSummary>>;

    /// Replace the project summary, archiving the prior version.
    async fn save_summary(&mut self, summary: &ProjectSummary) -> Result<()>;

    /// Load the report written by the last scan.
    async fn load_missing_docs_report(&self) -> Result<Option<MissingDocsReport>>;

    /// Write the missing-documentation report.
    async fn save_missing_docs_report(&mut self, report: &MissingDocsReport) -> Result<()>;

    // === Handoff ===

    /// Load the last session state.
    async fn load_session_state(&self) -> Result<Option<SessionState>>;

    /// Load the changelog.
    async fn load_changelog(&self) -> Result<Option<ChangelogStore>>;

    /// Load the last handoff document.
    async fn load_handoff(&self) -> Result<Option<AgentHandoff>>;

    /// Headings of the checkpoints currently in the log, newest first.
    async fn list_checkpoints(&self) -> Result<Vec<String>>;

    // === Transaction support ===

    /// Write all handoff documents at once. On failure every target keeps
    /// its previous content.
    async fn commit_handoff(&mut self, batch: HandoffBatch) -> Result<()>;
}
