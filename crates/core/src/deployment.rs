//! Deployment context and the output path table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::IGNORE_FILE_NAME;

/// Whether the tool analyzes itself or a project it is nested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// The tool directory is the project
    Standalone,
    /// The tool directory lives inside a host project
    Attached,
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentMode::Standalone => f.write_str("standalone"),
            DeploymentMode::Attached => f.write_str("attached"),
        }
    }
}

/// Facts about the host project, gathered in attached mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetadata {
    /// Project name
    pub name: String,

    /// Version declared by the project's manifest
    pub declared_version: String,

    /// Detected technologies
    pub tech_stack: Vec<String>,

    /// Short description
    pub description: Option<String>,

    /// `origin` remote URL
    pub vcs_remote: Option<String>,
}

impl HostMetadata {
    /// Metadata used when nothing could be read from the host.
    pub fn placeholder(host_root: &Path) -> Self {
        let name = host_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            name,
            declared_version: "unknown".to_string(),
            tech_stack: Vec::new(),
            description: None,
            vcs_remote: None,
        }
    }
}

/// Every file and directory the tool reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    /// Project summary document
    pub summary: PathBuf,

    /// Changelog store
    pub changelog: PathBuf,

    /// Session state store
    pub session_state: PathBuf,

    /// Next-agent handoff document
    pub handoff: PathBuf,

    /// Missing-documentation report
    pub missing_docs_report: PathBuf,

    /// Archived summaries
    pub history_dir: PathBuf,

    /// Rolling checkpoint log
    pub checkpoint_log: PathBuf,

    /// Archived changelog entries
    pub changelog_archive_dir: PathBuf,

    /// User ignore rules
    pub ignore_file: PathBuf,

    /// Directory the scanner walks
    pub scan_root: PathBuf,
}

impl OutputPaths {
    /// Derive the table from the output and host roots.
    pub fn derive(output_root: &Path, host_root: &Path) -> Self {
        let state_dir = output_root.join("codebase_summary");
        Self {
            summary: output_root.join("codebase_summary.json"),
            changelog: output_root.join("changelog_summary.json"),
            session_state: state_dir.join("session_state.json"),
            handoff: state_dir.join("agent_handoff.json"),
            missing_docs_report: state_dir.join("missing_breadcrumbs.json"),
            history_dir: state_dir.join("history"),
            checkpoint_log: output_root.join("checkpoints").join("checkpoint_log.md"),
            changelog_archive_dir: output_root.join("changelog_archives"),
            ignore_file: host_root.join(IGNORE_FILE_NAME),
            scan_root: host_root.to_path_buf(),
        }
    }

    /// Iterate over every path with a short label.
    pub fn entries(&self) -> [(&'static str, &Path); 10] {
        [
            ("summary", &self.summary),
            ("changelog", &self.changelog),
            ("session_state", &self.session_state),
            ("handoff", &self.handoff),
            ("missing_docs_report", &self.missing_docs_report),
            ("history_dir", &self.history_dir),
            ("checkpoint_log", &self.checkpoint_log),
            ("changelog_archive_dir", &self.changelog_archive_dir),
            ("ignore_file", &self.ignore_file),
            ("scan_root", &self.scan_root),
        ]
    }
}

/// Result of deployment resolution. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentContext {
    mode: DeploymentMode,
    tool_root: PathBuf,
    host_root: PathBuf,
    output_root: PathBuf,
    host_metadata: Option<HostMetadata>,
    paths: OutputPaths,
}

impl DeploymentContext {
    /// The tool analyzes its own directory.
    pub fn standalone(tool_root: impl Into<PathBuf>) -> Self {
        let tool_root = tool_root.into();
        let paths = OutputPaths::derive(&tool_root, &tool_root);
        Self {
            mode: DeploymentMode::Standalone,
            host_root: tool_root.clone(),
            output_root: tool_root.clone(),
            tool_root,
            host_metadata: None,
            paths,
        }
    }

    /// The tool is nested in `host_root`; outputs go to
    /// `<host_root>/<tool directory name>`.
    pub fn attached(
        tool_root: impl Into<PathBuf>,
        host_root: impl Into<PathBuf>,
        host_metadata: HostMetadata,
    ) -> Self {
        let tool_root = tool_root.into();
        let host_root = host_root.into();
        let output_root = match tool_root.file_name() {
            Some(name) => host_root.join(name),
            None => host_root.clone(),
        };
        let paths = OutputPaths::derive(&output_root, &host_root);
        Self {
            mode: DeploymentMode::Attached,
            tool_root,
            host_root,
            output_root,
            host_metadata: Some(host_metadata),
            paths,
        }
    }

    /// Resolved mode
    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Directory holding the tool itself
    pub fn tool_root(&self) -> &Path {
        &self.tool_root
    }

    /// Root of the analyzed project
    pub fn host_root(&self) -> &Path {
        &self.host_root
    }

    /// Directory all outputs are placed under
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Host facts (attached mode only)
    pub fn host_metadata(&self) -> Option<&HostMetadata> {
        self.host_metadata.as_ref()
    }

    /// Canonical path table
    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }
}
