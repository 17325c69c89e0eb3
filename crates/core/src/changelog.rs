//! Changelog store and checkpoint log entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::version::SemVer;
use crate::Time;

/// Kind of change recorded in the changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    /// New functionality
    Feature,
    /// Known defect or unresolved problem
    Bug,
    /// Defect fixed
    Fix,
    /// Improvement to existing functionality
    Enhancement,
    /// Internal restructuring
    Refactor,
    /// Incompatible change
    Breaking,
    /// Documentation only
    Docs,
}

impl ChangeCategory {
    /// Lowercase name as stored on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::Feature => "feature",
            ChangeCategory::Bug => "bug",
            ChangeCategory::Fix => "fix",
            ChangeCategory::Enhancement => "enhancement",
            ChangeCategory::Refactor => "refactor",
            ChangeCategory::Breaking => "breaking",
            ChangeCategory::Docs => "docs",
        }
    }
}

impl std::fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feature" => Ok(ChangeCategory::Feature),
            "bug" => Ok(ChangeCategory::Bug),
            "fix" => Ok(ChangeCategory::Fix),
            "enhancement" => Ok(ChangeCategory::Enhancement),
            "refactor" => Ok(ChangeCategory::Refactor),
            "breaking" => Ok(ChangeCategory::Breaking),
            "docs" | "documentation" => Ok(ChangeCategory::Docs),
            other => Err(format!("unknown change category '{other}'")),
        }
    }
}

/// One changelog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    /// Sequential id, e.g. `change_007`
    pub id: String,

    /// Changelog version assigned with this entry
    pub version: SemVer,

    /// When the entry was recorded
    pub date: Time,

    /// Kind of change
    pub category: ChangeCategory,

    /// One-line description
    pub summary: String,

    /// Project summary version at the time of the entry
    #[serde(default)]
    pub project_version: Option<SemVer>,
}

/// Derived counts, recomputed after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangelogStatistics {
    /// Entries currently held
    pub total_entries: usize,

    /// Entries per category name
    pub entries_by_category: BTreeMap<String, usize>,

    /// Entries moved to archive files over the store's lifetime
    #[serde(default)]
    pub archived_entries: usize,
}

/// The changelog document. Entries are kept newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogStore {
    /// Independent of the project summary version
    pub changelog_version: SemVer,

    /// Last modification
    pub last_updated: Option<Time>,

    /// Entries, newest first
    #[serde(default)]
    pub entries: Vec<ChangelogEntry>,

    /// Derived statistics
    #[serde(default)]
    pub statistics: ChangelogStatistics,

    /// Last id number handed out
    #[serde(default)]
    pub sequence: u64,
}

impl Default for ChangelogStore {
    fn default() -> Self {
        Self {
            changelog_version: SemVer::INITIAL,
            last_updated: None,
            entries: Vec::new(),
            statistics: ChangelogStatistics::default(),
            sequence: 0,
        }
    }
}

impl ChangelogStore {
    /// Record a session outcome: bumps the minor version and inserts the
    /// entry at the front.
    pub fn record(
        &mut self,
        category: ChangeCategory,
        summary: impl Into<String>,
        project_version: Option<SemVer>,
        now: Time,
    ) -> &ChangelogEntry {
        self.sequence += 1;
        self.changelog_version = self.changelog_version.bump_minor();
        let entry = ChangelogEntry {
            id: format!("change_{:03}", self.sequence),
            version: self.changelog_version,
            date: now,
            category,
            summary: summary.into(),
            project_version,
        };
        self.entries.insert(0, entry);
        self.last_updated = Some(now);
        self.refresh_statistics();
        &self.entries[0]
    }

    /// Remove and return the entries beyond `retention`, oldest last.
    pub fn take_overflow(&mut self, retention: usize) -> Vec<ChangelogEntry> {
        if self.entries.len() <= retention {
            return Vec::new();
        }
        let overflow = self.entries.split_off(retention);
        self.statistics.archived_entries += overflow.len();
        self.refresh_statistics();
        overflow
    }

    /// Recompute derived statistics from the entries.
    pub fn refresh_statistics(&mut self) {
        let mut by_category = BTreeMap::new();
        for entry in &self.entries {
            *by_category.entry(entry.category.to_string()).or_insert(0) += 1;
        }
        self.statistics.total_entries = self.entries.len();
        self.statistics.entries_by_category = by_category;
    }

    /// Most recent entries in a category, newest first.
    pub fn recent(&self, category: ChangeCategory, limit: usize) -> impl Iterator<Item = &ChangelogEntry> {
        self.entries
            .iter()
            .take(limit)
            .filter(move |e| e.category == category)
    }
}

/// One section of the checkpoint log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    /// When the checkpoint was taken
    pub timestamp: Time,

    /// Changelog version after the handoff
    pub changelog_version: SemVer,

    /// Project summary version, if a scan has run
    pub project_version: Option<SemVer>,

    /// Category of the matching changelog entry
    pub category: ChangeCategory,

    /// Session summary
    pub summary: String,
}

impl CheckpointEntry {
    /// Heading prefix that starts every section.
    pub const HEADING: &'static str = "## Automated Checkpoint: ";

    /// Render the entry as a markdown section.
    ///
    /// Continuation lines of a multi-line summary are indented so they stay
    /// inside the list item and never open a section of their own.
    pub fn render(&self) -> String {
        let summary = self.summary.trim().lines().collect::<Vec<_>>().join("\n  ");
        let project = self
            .project_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "{}{}\n\n\
             ### Project State\n\
             - **Version**: {}\n\
             - **Project Version**: {}\n\
             - **Type**: {}\n\n\
             ### Recent Changes\n\
             - {}\n\n\
             ---\n",
            Self::HEADING,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.changelog_version,
            project,
            self.category,
            summary,
        )
    }
}
