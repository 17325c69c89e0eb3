//! Scan records and the persisted project summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::version::SemVer;
use crate::Time;

/// How an ignore pattern is matched against a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreRuleKind {
    /// Must equal one whole path segment.
    ExactSegment,
    /// Substring of the `/`-joined relative path.
    Substring,
    /// `*` / `?` glob.
    Glob,
}

/// A single exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    /// Normalized pattern text
    pub pattern: String,

    /// Matching strategy
    pub kind: IgnoreRuleKind,
}

impl IgnoreRule {
    /// Normalize a raw pattern and derive its kind.
    ///
    /// A trailing `/` is dropped, so `build/` and `build` are the same rule.
    /// Returns `None` when nothing is left after normalization.
    pub fn new(raw: &str) -> Option<Self> {
        let pattern = raw.trim().trim_end_matches('/').trim_start_matches("./");
        if pattern.is_empty() {
            return None;
        }

        let kind = if pattern.contains('*') || pattern.contains('?') {
            IgnoreRuleKind::Glob
        } else if pattern.contains('/') {
            IgnoreRuleKind::Substring
        } else {
            IgnoreRuleKind::ExactSegment
        };

        Some(Self {
            pattern: pattern.to_string(),
            kind,
        })
    }
}

/// Per-file scan result. Held only until it is folded into a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Root-relative path with `/` separators
    pub path: String,

    /// Language key (file extension without the dot)
    pub language: String,

    /// Unique detected names, in first-seen order
    pub function_names: Vec<String>,

    /// Detected names with no marker in their window
    pub undocumented: Vec<String>,

    /// Functions with a documentation marker in their window
    pub documented_count: usize,

    /// Number of detected functions
    pub total_functions: usize,

    /// Number of lines in the file
    pub lines_of_code: usize,
}

impl FileRecord {
    /// Functions without a documentation marker.
    pub fn undocumented_count(&self) -> usize {
        self.total_functions.saturating_sub(self.documented_count)
    }

    /// Parent directory of the record, `.` for files at the root.
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => ".",
        }
    }
}

/// Output size of the persisted summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Aggregate counts and the language breakdown only
    Minimal,
    /// Adds per-language details and the run report
    #[default]
    Standard,
}

/// Error returned for an unknown verbosity name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verbosity '{0}' (expected minimal or standard)")]
pub struct VerbosityParseError(pub String);

impl std::str::FromStr for Verbosity {
    type Err = VerbosityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(Verbosity::Minimal),
            "standard" => Ok(Verbosity::Standard),
            _ => Err(VerbosityParseError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verbosity::Minimal => f.write_str("minimal"),
            Verbosity::Standard => f.write_str("standard"),
        }
    }
}

/// File and function counts for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LanguageCount {
    /// Files scanned
    pub files: usize,

    /// Functions detected
    pub functions: usize,
}

/// Extended per-language statistics emitted at `standard` verbosity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LanguageDetail {
    /// Files scanned
    pub files: usize,

    /// Functions detected
    pub functions: usize,

    /// Functions carrying a marker
    pub documented: usize,

    /// Coverage for this language
    pub coverage_pct: f64,

    /// Total lines across the language's files
    pub lines_of_code: usize,
}

/// Counts of everything a scan skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Files read and analyzed
    pub files_scanned: usize,

    /// Files skipped because they looked binary
    pub skipped_binary: usize,

    /// Files that could not be read
    pub skipped_unreadable: usize,

    /// Files above the size limit
    pub skipped_oversized: usize,

    /// Ignore-file lines that could not be parsed
    pub ignore_rule_errors: usize,

    /// Directories not descended into
    pub directories_pruned: usize,
}

impl RunReport {
    /// Total number of skipped files.
    pub fn skipped_files(&self) -> usize {
        self.skipped_binary + self.skipped_unreadable + self.skipped_oversized
    }
}

/// The persisted result of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// Analysis version; increases only when counts change
    pub version: SemVer,

    /// When this summary was built
    pub generated_at: Time,

    /// Files that contributed records
    pub total_files: usize,

    /// Functions across all files
    pub total_functions: usize,

    /// Functions with a documentation marker
    pub documented_functions: usize,

    /// Rounded to one decimal
    pub coverage_pct: f64,

    /// Keyed by language extension
    pub language_breakdown: BTreeMap<String, LanguageCount>,

    /// Which component and version produced the file
    pub generator_attribution: String,

    /// Verbosity used to build this summary
    #[serde(default)]
    pub verbosity: Verbosity,

    /// Per-language details (standard verbosity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_details: Option<BTreeMap<String, LanguageDetail>>,

    /// Skip counts from the run (standard verbosity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_report: Option<RunReport>,
}

impl ProjectSummary {
    /// True when the counts that drive versioning are identical.
    pub fn same_counts(&self, other: &ProjectSummary) -> bool {
        self.total_files == other.total_files
            && self.total_functions == other.total_functions
            && self.documented_functions == other.documented_functions
    }
}

/// A file listed in the missing-documentation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDocsFile {
    /// Root-relative path
    pub path: String,

    /// Functions without a marker
    pub undocumented: usize,

    /// Functions detected
    pub total: usize,
}

/// Files with undocumented functions, grouped by directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingDocsReport {
    /// When the report was built
    pub generated_at: Time,

    /// Files need more than this many undocumented functions to be listed
    pub threshold: usize,

    /// Listed files across all directories
    pub total_files: usize,

    /// Undocumented functions across listed files
    pub total_undocumented: usize,

    /// Keyed by root-relative directory
    pub directories: BTreeMap<String, Vec<MissingDocsFile>>,
}

impl MissingDocsReport {
    /// True when no directory qualified.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

/// Percentage of documented functions, rounded to one decimal.
///
/// Returns `0.0` when there are no functions.
pub fn coverage_pct(documented: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = documented as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}
