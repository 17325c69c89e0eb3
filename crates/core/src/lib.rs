//! Arkival core data models.
//!
//! This crate defines the records shared by the scanner, the deployment
//! resolver and the handoff synchronizer. It performs no I/O.

#![warn(missing_docs)]

// Core identities
mod id;
mod version;

// Scanning and summaries
mod summary;

// Deployment
mod deployment;
mod config;

// Session handoff
mod session;
mod changelog;

// Re-exports
pub use id::SessionId;
pub use version::{SemVer, SemVerError};

pub use summary::{
    IgnoreRule, IgnoreRuleKind, FileRecord, ProjectSummary, LanguageCount, LanguageDetail,
    MissingDocsFile, MissingDocsReport, RunReport, Verbosity, VerbosityParseError, coverage_pct,
};

pub use deployment::{DeploymentContext, DeploymentMode, HostMetadata, OutputPaths};
pub use config::{ArkivalConfig, ScanConfig, HandoffConfig, CONFIG_FILE_NAME, IGNORE_FILE_NAME};

pub use session::{SessionState, SessionOutcome, AgentHandoff};
pub use changelog::{
    ChangelogStore, ChangelogEntry, ChangeCategory, ChangelogStatistics, CheckpointEntry,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
