//! Scan errors.

use std::path::PathBuf;

/// Error type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Fatal scan errors. Nothing is written when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The scan root is missing or cannot be listed
    #[error("cannot read scan root {}: {source}", path.display())]
    UnreadableRoot {
        /// Requested root
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// A detection pattern failed to compile
    #[error("invalid detection pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A line of the ignore file that could not be turned into a rule.
///
/// Non-fatal: the line is skipped and counted in the run report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ignore rule on line {line} ('{pattern}') skipped: {reason}")]
pub struct IgnoreRuleParseError {
    /// 1-based line number in the ignore file
    pub line: usize,
    /// Raw pattern text
    pub pattern: String,
    /// Why it was rejected
    pub reason: String,
}

/// A file that could not be read. Non-fatal.
#[derive(Debug, thiserror::Error)]
#[error("cannot read {}: {source}", path.display())]
pub struct UnreadableFileError {
    /// Offending file
    pub path: PathBuf,
    /// Underlying failure
    #[source]
    pub source: std::io::Error,
}
