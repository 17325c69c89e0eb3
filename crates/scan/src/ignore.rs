//! Path exclusion rules.
//!
//! Built-in defaults plus the user's `.scanignore`. Rules are matched against
//! a root-relative path split into segments.

use std::collections::HashSet;
use std::path::Path;

use arkival_core::{IgnoreRule, IgnoreRuleKind};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use crate::error::IgnoreRuleParseError;

/// Rules applied to every scan.
pub const DEFAULT_IGNORES: &[&str] = &[
    // Version control
    ".git",
    ".hg",
    ".svn",
    // Dependencies and build output
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "vendor",
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    ".next",
    ".nuxt",
    "coverage",
    ".cache",
    ".venv",
    "venv",
    ".pythonlibs",
    "test-results",
    "*_assets",
    // Editors and local tool state
    ".local",
    ".config",
    ".vscode",
    ".idea",
    ".DS_Store",
    // Our own fixtures and archives
    "language_scan_tests",
    "codebase_summary/history",
    "checkpoints",
    "workflow_export_package",
];

/// Compiled set of ignore rules. Immutable once built.
#[derive(Debug, Clone)]
pub struct IgnoreEngine {
    rules: Vec<IgnoreRule>,
    exact: HashSet<String>,
    substrings: Vec<String>,
    globs: GlobSet,
    errors: Vec<IgnoreRuleParseError>,
}

impl IgnoreEngine {
    /// Engine with only the built-in rules.
    pub fn with_defaults() -> Self {
        Self::from_lines(std::iter::empty::<&str>())
    }

    /// Engine with the built-in rules plus the given ignore-file lines.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut rules: Vec<IgnoreRule> = DEFAULT_IGNORES.iter().filter_map(|p| IgnoreRule::new(p)).collect();
        let mut errors = Vec::new();

        for (idx, raw) in lines.into_iter().enumerate() {
            let text = raw.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            let Some(rule) = IgnoreRule::new(text) else {
                errors.push(IgnoreRuleParseError {
                    line: idx + 1,
                    pattern: raw.to_string(),
                    reason: "pattern is empty after normalization".to_string(),
                });
                continue;
            };
            if rule.kind == IgnoreRuleKind::Glob {
                if let Err(e) = Glob::new(&rule.pattern) {
                    errors.push(IgnoreRuleParseError {
                        line: idx + 1,
                        pattern: raw.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }

        for e in &errors {
            warn!("{}", e);
        }
        Self::compile(rules, errors)
    }

    /// Load the built-in rules and the ignore file at `path`, if present.
    ///
    /// A missing file is not an error; an unreadable one is logged and
    /// ignored.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let engine = Self::from_lines(text.lines());
                debug!("Loaded {} ignore rules from {}", engine.rules.len(), path.display());
                engine
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::with_defaults(),
            Err(e) => {
                warn!("Cannot read ignore file {}: {}; using defaults", path.display(), e);
                Self::with_defaults()
            }
        }
    }

    fn compile(rules: Vec<IgnoreRule>, errors: Vec<IgnoreRuleParseError>) -> Self {
        let mut exact = HashSet::new();
        let mut substrings = Vec::new();
        let mut builder = GlobSetBuilder::new();

        for rule in &rules {
            match rule.kind {
                IgnoreRuleKind::ExactSegment => {
                    exact.insert(rule.pattern.clone());
                }
                IgnoreRuleKind::Substring => substrings.push(rule.pattern.clone()),
                IgnoreRuleKind::Glob => {
                    // Validated in from_lines.
                    if let Ok(glob) = Glob::new(&rule.pattern) {
                        builder.add(glob);
                    }
                }
            }
        }
        let globs = builder.build().unwrap_or_else(|e| {
            warn!("Glob set failed to build: {}; glob rules disabled", e);
            GlobSet::empty()
        });

        Self {
            rules,
            exact,
            substrings,
            globs,
            errors,
        }
    }

    /// True when any rule excludes the path made of `segments`.
    pub fn should_ignore<S: AsRef<str>>(&self, segments: &[S]) -> bool {
        if segments.iter().any(|s| self.exact.contains(s.as_ref())) {
            return true;
        }

        let joined = segments.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("/");
        if self.substrings.iter().any(|p| joined.contains(p.as_str())) {
            return true;
        }

        if !self.globs.is_empty() {
            if self.globs.is_match(&joined) {
                return true;
            }
            if segments.iter().any(|s| self.globs.is_match(s.as_ref())) {
                return true;
            }
        }
        false
    }

    /// [`should_ignore`](Self::should_ignore) over a relative path.
    pub fn should_ignore_path(&self, relative: &Path) -> bool {
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        self.should_ignore(&segments)
    }

    /// Active rules, defaults first.
    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Lines rejected while loading.
    pub fn errors(&self) -> &[IgnoreRuleParseError] {
        &self.errors
    }
}

impl Default for IgnoreEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(path: &str) -> Vec<&str> {
        path.split('/').collect()
    }

    #[test]
    fn test_exact_segment_does_not_match_inside_names() {
        let engine = IgnoreEngine::from_lines(["out"]);
        assert!(!engine.should_ignore(&split("src/routes/index.js")));
        assert!(engine.should_ignore(&split("build/out/index.js")));
        assert!(engine.should_ignore(&split("out")));
    }

    #[test]
    fn test_defaults_prune_dependency_dirs() {
        let engine = IgnoreEngine::with_defaults();
        assert!(engine.should_ignore(&split("web/node_modules/react/index.js")));
        assert!(engine.should_ignore(&split(".git")));
        assert!(engine.should_ignore(&split("arkival/codebase_summary/history/old.json")));
        assert!(!engine.should_ignore(&split("src/lib.rs")));
        assert!(!engine.should_ignore(&split("src/outbound.rs")));
    }

    #[test]
    fn test_defaults_prune_assets_and_local_state() {
        let engine = IgnoreEngine::with_defaults();
        assert!(engine.should_ignore(&split("attached_assets/chart.js")));
        assert!(engine.should_ignore(&split("web/theme_assets/app.ts")));
        assert!(engine.should_ignore(&split(".config/nvim/init.lua")));
        assert!(engine.should_ignore(&split(".local/share/tool.py")));
        assert!(engine.should_ignore(&split("arkival/checkpoints/log.md")));
        assert!(engine.should_ignore(&split("workflow_export_package/setup.py")));
        assert!(!engine.should_ignore(&split("src/assets/app.ts")));
        assert!(!engine.should_ignore(&split("src/config/mod.rs")));
    }

    #[test]
    fn test_comments_blank_lines_and_trailing_slash() {
        let text = "# generated output\n\ngenerated/\nlogs # runtime logs\n";
        let engine = IgnoreEngine::from_lines(text.lines());
        assert!(engine.errors().is_empty());
        assert!(engine.should_ignore(&split("generated/api.ts")));
        assert!(engine.should_ignore(&split("app/logs/today.py")));
        assert!(!engine.should_ignore(&split("app/logsink.py")));
    }

    #[test]
    fn test_substring_rules_match_joined_path() {
        let engine = IgnoreEngine::from_lines(["docs/generated"]);
        assert!(engine.should_ignore(&split("docs/generated/a.js")));
        assert!(engine.should_ignore(&split("pkg/docs/generated/b.js")));
        assert!(!engine.should_ignore(&split("docs/guide/a.js")));
    }

    #[test]
    fn test_glob_rules_match_path_and_segments() {
        let engine = IgnoreEngine::from_lines(["*.min.js", "tmp_*"]);
        assert!(engine.should_ignore(&split("static/app.min.js")));
        assert!(engine.should_ignore(&split("tmp_data/x.py")));
        assert!(!engine.should_ignore(&split("static/app.js")));
    }

    #[test]
    fn test_invalid_glob_is_skipped_and_recorded() {
        let engine = IgnoreEngine::from_lines(["ok_dir", "bad[glob*"]);
        assert_eq!(engine.errors().len(), 1);
        assert_eq!(engine.errors()[0].line, 2);
        assert!(engine.should_ignore(&split("ok_dir/a.rs")));
    }

    #[test]
    fn test_missing_ignore_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let engine = IgnoreEngine::load(&dir.path().join(".scanignore"));
        assert_eq!(engine.rules().len(), DEFAULT_IGNORES.len());
    }
}
