//! Tool configuration, read from `arkival.config.json`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::deployment::DeploymentMode;
use crate::summary::Verbosity;

/// Marker and configuration file name.
pub const CONFIG_FILE_NAME: &str = "arkival.config.json";

/// User ignore file name, read from the host root.
pub const IGNORE_FILE_NAME: &str = ".scanignore";

/// Top-level configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArkivalConfig {
    /// Declared mode; informational, resolution does not depend on it
    pub deployment_mode: Option<DeploymentMode>,

    /// Host root, relative to the directory holding the config file
    pub host_root: Option<PathBuf>,

    /// Name of the tool directory inside the host
    pub tool_directory: Option<String>,

    /// Scanner settings
    pub scan: ScanConfig,

    /// Handoff settings
    pub handoff: HandoffConfig,
}

/// Scanner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files above this size are skipped
    pub max_file_size_bytes: u64,

    /// Files with more undocumented functions than this are reported
    pub missing_docs_threshold: usize,

    /// Summary verbosity
    pub verbosity: Verbosity,

    /// Archived summaries to keep
    pub history_retention: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 5 * 1024 * 1024,
            missing_docs_threshold: 0,
            verbosity: Verbosity::Standard,
            history_retention: 6,
        }
    }
}

/// Handoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Checkpoint sections kept in the log
    pub checkpoint_retention: usize,

    /// Changelog entries kept before archiving
    pub changelog_retention: usize,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            checkpoint_retention: 20,
            changelog_retention: 25,
        }
    }
}
