//! Deployment mode detection.

use std::path::{Path, PathBuf};

use arkival_core::{ArkivalConfig, DeploymentContext, CONFIG_FILE_NAME};
use tracing::{debug, info, warn};

use crate::config::load_config;
use crate::error::{DeployError, PathResolutionAmbiguous, Result};
use crate::metadata::extract_host_metadata;

/// Directory names recognized as the tool's own checkout.
pub const CANONICAL_NAMES: &[&str] = &["arkival", "arkival-v4"];

/// How many parent directories are searched for a marker file.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Which rule produced the deployment context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// A marker file was found outside the tool root
    Marker {
        /// The marker file used
        config_path: PathBuf,
    },
    /// The tool directory has a canonical name
    Canonical,
    /// Neither; the tool root is analyzed on its own
    Unrecognized,
}

/// Full outcome of a resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Resolved context
    pub context: DeploymentContext,
    /// Configuration in effect
    pub config: ArkivalConfig,
    /// Rule that applied
    pub layout: Layout,
    /// Set when several marker files were found
    pub ambiguity: Option<PathResolutionAmbiguous>,
}

/// Resolves a [`DeploymentContext`] for a tool checkout.
#[derive(Debug, Clone)]
pub struct Resolver {
    tool_root: PathBuf,
    max_depth: usize,
}

impl Resolver {
    /// Create a resolver for the tool at `tool_root`.
    pub fn new(tool_root: impl Into<PathBuf>) -> Self {
        Self {
            tool_root: tool_root.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit how many parents are searched.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve the context for a run started in `cwd`.
    pub fn resolve(&self, cwd: &Path) -> Result<DeploymentContext> {
        Ok(self.resolve_full(cwd)?.context)
    }

    /// Resolve the context and return the configuration and rule used.
    pub fn resolve_full(&self, cwd: &Path) -> Result<Resolution> {
        if !self.tool_root.is_dir() {
            return Err(DeployError::ToolRoot(self.tool_root.clone()));
        }
        let tool_root = canonical(&self.tool_root);
        let cwd = canonical(cwd);

        let candidates = self.find_markers(&tool_root, &cwd);
        if let Some(nearest) = candidates.first() {
            let ambiguity = (candidates.len() > 1).then(|| PathResolutionAmbiguous {
                chosen: nearest.clone(),
                candidates: candidates.clone(),
            });
            if let Some(ambiguity) = &ambiguity {
                warn!("{}", ambiguity);
            }
            return self.attached(tool_root, nearest.clone(), ambiguity);
        }

        let config = load_config(&tool_root.join(CONFIG_FILE_NAME))?;
        let layout = if is_canonical(&tool_root) {
            debug!("Standalone: canonical tool directory {}", tool_root.display());
            Layout::Canonical
        } else {
            info!(
                "Unrecognized layout at {}; analyzing the tool directory on its own",
                tool_root.display()
            );
            Layout::Unrecognized
        };

        Ok(Resolution {
            context: DeploymentContext::standalone(tool_root),
            config,
            layout,
            ambiguity: None,
        })
    }

    fn attached(
        &self,
        tool_root: PathBuf,
        config_path: PathBuf,
        ambiguity: Option<PathResolutionAmbiguous>,
    ) -> Result<Resolution> {
        let config = load_config(&config_path)?;
        let config_dir = config_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let host_root = match &config.host_root {
            Some(host) => canonical(&config_dir.join(host)),
            None => config_dir,
        };

        info!(
            "Attached to {} (marker {})",
            host_root.display(),
            config_path.display()
        );
        let metadata = extract_host_metadata(&host_root);
        Ok(Resolution {
            context: DeploymentContext::attached(tool_root, host_root, metadata),
            config,
            layout: Layout::Marker { config_path },
            ambiguity,
        })
    }

    /// Marker files above `cwd` outside the tool root, nearest first.
    fn find_markers(&self, tool_root: &Path, cwd: &Path) -> Vec<PathBuf> {
        cwd.ancestors()
            .take(self.max_depth + 1)
            .filter(|dir| !dir.starts_with(tool_root))
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file())
            .collect()
    }
}

fn is_canonical(tool_root: &Path) -> bool {
    tool_root
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .is_some_and(|n| CANONICAL_NAMES.contains(&n.as_str()))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkival_core::DeploymentMode;
    use std::fs;

    fn tree() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("host/Arkival")).unwrap();
        let host = canonical(&dir.path().join("host"));
        let tool = host.join("Arkival");
        (dir, host, tool)
    }

    #[test]
    fn test_marker_in_parent_attaches() {
        let (_dir, host, tool) = tree();
        fs::write(host.join(CONFIG_FILE_NAME), r#"{ "deployment_mode": "attached", "host_root": "." }"#).unwrap();
        fs::write(host.join("package.json"), r#"{ "name": "shop", "version": "1.4.0" }"#).unwrap();

        let resolution = Resolver::new(&tool).resolve_full(&tool).unwrap();
        let context = &resolution.context;
        assert_eq!(context.mode(), DeploymentMode::Attached);
        assert_eq!(context.host_root(), host.as_path());
        assert_eq!(context.output_root(), host.join("Arkival").as_path());
        assert_eq!(context.paths().summary, host.join("Arkival/codebase_summary.json"));
        assert_eq!(context.paths().scan_root, host);
        assert_eq!(context.host_metadata().unwrap().name, "shop");
        assert!(resolution.ambiguity.is_none());
        assert!(matches!(resolution.layout, Layout::Marker { .. }));
    }

    #[test]
    fn test_removed_marker_falls_back_to_standalone() {
        let (_dir, host, tool) = tree();
        let marker = host.join(CONFIG_FILE_NAME);
        fs::write(&marker, "{}").unwrap();
        assert_eq!(Resolver::new(&tool).resolve(&tool).unwrap().mode(), DeploymentMode::Attached);

        fs::remove_file(&marker).unwrap();
        let context = Resolver::new(&tool).resolve(&tool).unwrap();
        assert_eq!(context.mode(), DeploymentMode::Standalone);
        assert_eq!(context.output_root(), tool.as_path());
        assert_eq!(context.paths().summary, tool.join("codebase_summary.json"));
    }

    #[test]
    fn test_marker_inside_tool_root_is_not_a_host() {
        let (_dir, _host, tool) = tree();
        fs::write(tool.join(CONFIG_FILE_NAME), r#"{ "scan": { "history_retention": 2 } }"#).unwrap();

        let resolution = Resolver::new(&tool).resolve_full(&tool).unwrap();
        assert_eq!(resolution.context.mode(), DeploymentMode::Standalone);
        assert_eq!(resolution.layout, Layout::Canonical);
        assert_eq!(resolution.config.scan.history_retention, 2);
    }

    #[test]
    fn test_unrecognized_layout_is_standalone() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("summarizer");
        fs::create_dir(&tool).unwrap();

        let resolution = Resolver::new(&tool).resolve_full(&tool).unwrap();
        assert_eq!(resolution.context.mode(), DeploymentMode::Standalone);
        assert_eq!(resolution.layout, Layout::Unrecognized);
    }

    #[test]
    fn test_host_root_relative_to_marker() {
        let dir = tempfile::tempdir().unwrap();
        let base = canonical(dir.path());
        let tool = base.join("app/tools/arkival");
        fs::create_dir_all(&tool).unwrap();
        fs::write(base.join("app/tools").join(CONFIG_FILE_NAME), r#"{ "host_root": ".." }"#).unwrap();

        let context = Resolver::new(&tool).resolve(&tool).unwrap();
        assert_eq!(context.host_root(), base.join("app").as_path());
        assert_eq!(context.output_root(), base.join("app/arkival").as_path());
    }

    #[test]
    fn test_nearest_marker_wins() {
        let (_dir, host, tool) = tree();
        let outer = host.parent().unwrap().to_path_buf();
        fs::write(outer.join(CONFIG_FILE_NAME), "{}").unwrap();
        fs::write(host.join(CONFIG_FILE_NAME), "{}").unwrap();

        let resolution = Resolver::new(&tool).resolve_full(&tool).unwrap();
        assert_eq!(resolution.context.host_root(), host.as_path());
        let ambiguity = resolution.ambiguity.unwrap();
        assert_eq!(ambiguity.candidates.len(), 2);
        assert_eq!(ambiguity.chosen, host.join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_search_depth_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let base = canonical(dir.path());
        let tool = base.join("a/b/c/arkival");
        fs::create_dir_all(&tool).unwrap();
        fs::write(base.join(CONFIG_FILE_NAME), "{}").unwrap();

        let shallow = Resolver::new(&tool).with_max_depth(2).resolve(&tool).unwrap();
        assert_eq!(shallow.mode(), DeploymentMode::Standalone);
        let deep = Resolver::new(&tool).resolve(&tool).unwrap();
        assert_eq!(deep.mode(), DeploymentMode::Attached);
    }

    #[test]
    fn test_malformed_marker_is_an_error() {
        let (_dir, host, tool) = tree();
        fs::write(host.join(CONFIG_FILE_NAME), "[1, 2").unwrap();
        assert!(matches!(Resolver::new(&tool).resolve(&tool), Err(DeployError::Config { .. })));
    }

    #[test]
    fn test_missing_tool_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Resolver::new(dir.path().join("gone")).resolve(dir.path()).unwrap_err();
        assert!(matches!(err, DeployError::ToolRoot(_)));
    }
}
