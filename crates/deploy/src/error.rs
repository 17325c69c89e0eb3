//! Deployment errors.

use std::path::PathBuf;

/// Error type for deployment resolution.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Deployment resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The configuration file exists but is not valid
    #[error("invalid configuration {}: {source}", path.display())]
    Config {
        /// Offending file
        path: PathBuf,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// The tool root does not exist or is not a directory
    #[error("tool root {} is not a directory", .0.display())]
    ToolRoot(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git error
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

/// More than one marker file was found above the working directory.
///
/// Not fatal: the nearest one is used and this is logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} marker files found; using {}", candidates.len(), chosen.display())]
pub struct PathResolutionAmbiguous {
    /// Marker file that was used
    pub chosen: PathBuf,
    /// Every marker file found, nearest first
    pub candidates: Vec<PathBuf>,
}
