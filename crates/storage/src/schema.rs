//! On-disk document schemas.
//!
//! Current documents carry a `schema` tag. Documents without one are read
//! through the legacy shapes and migrated in memory; anything else is a
//! [`StorageError::Schema`] and is never overwritten silently.

use std::collections::BTreeMap;
use std::path::Path;

use arkival_core::{
    AgentHandoff, ChangeCategory, ChangelogEntry, ChangelogStore, DeploymentMode, LanguageCount,
    MissingDocsReport, ProjectSummary, SemVer, SessionId, SessionOutcome, SessionState, Time,
    Verbosity,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::trait_::{Result, StorageError};

/// Project summary.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum SummaryDocument {
    /// Current shape
    #[serde(rename = "project_summary/v2")]
    V2(ProjectSummary),
}

/// Changelog.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum ChangelogDocument {
    /// Current shape
    #[serde(rename = "changelog/v2")]
    V2(ChangelogStore),
}

/// Session state.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum SessionDocument {
    /// Current shape
    #[serde(rename = "session_state/v2")]
    V2(SessionState),
}

/// Next-agent handoff.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum HandoffDocument {
    /// Current shape
    #[serde(rename = "agent_handoff/v1")]
    V1(AgentHandoff),
}

/// Missing-documentation report.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum MissingDocsDocument {
    /// Current shape
    #[serde(rename = "missing_docs/v1")]
    V1(MissingDocsReport),
}

/// Changelog entries moved out by retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogArchive {
    /// When the entries were archived
    pub archived_at: Time,

    /// Project summary version at archive time
    pub project_version: Option<SemVer>,

    /// Number of entries in this file
    pub archived_entries_count: usize,

    /// Archived entries, newest first
    pub entries: Vec<ChangelogEntry>,
}

/// Changelog archive file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum ChangelogArchiveDocument {
    /// Current shape
    #[serde(rename = "changelog_archive/v1")]
    V1(ChangelogArchive),
}

fn schema_error(path: &Path, reason: impl std::fmt::Display) -> StorageError {
    StorageError::Schema {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn parse_value(path: &Path, raw: &[u8]) -> Result<Value> {
    serde_json::from_slice(raw).map_err(|e| schema_error(path, e))
}

fn is_tagged(value: &Value) -> bool {
    value.get("schema").is_some()
}

/// Decode a summary document, migrating the legacy shape.
pub fn decode_summary(path: &Path, raw: &[u8]) -> Result<ProjectSummary> {
    let value = parse_value(path, raw)?;
    if is_tagged(&value) {
        let SummaryDocument::V2(summary) =
            serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
        return Ok(summary);
    }
    let legacy: LegacySummary = serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
    info!("Migrating legacy summary at {}", path.display());
    Ok(legacy.migrate())
}

/// Decode a changelog document, migrating the legacy shape.
pub fn decode_changelog(path: &Path, raw: &[u8]) -> Result<ChangelogStore> {
    let value = parse_value(path, raw)?;
    if is_tagged(&value) {
        let ChangelogDocument::V2(store) =
            serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
        return Ok(store);
    }
    let legacy: LegacyChangelog = serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
    info!("Migrating legacy changelog at {}", path.display());
    Ok(legacy.migrate())
}

/// Decode a session state document, migrating the legacy shape.
pub fn decode_session(path: &Path, raw: &[u8]) -> Result<SessionState> {
    let value = parse_value(path, raw)?;
    if is_tagged(&value) {
        let SessionDocument::V2(state) =
            serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
        return Ok(state);
    }
    let legacy: LegacySessionState =
        serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
    info!("Migrating legacy session state at {}", path.display());
    Ok(legacy.migrate())
}

/// Decode a handoff document. There is no legacy handoff shape worth reading.
pub fn decode_handoff(path: &Path, raw: &[u8]) -> Result<AgentHandoff> {
    let value = parse_value(path, raw)?;
    let HandoffDocument::V1(handoff) =
        serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
    Ok(handoff)
}

/// Decode a missing-documentation report.
pub fn decode_missing_docs(path: &Path, raw: &[u8]) -> Result<MissingDocsReport> {
    let value = parse_value(path, raw)?;
    let MissingDocsDocument::V1(report) =
        serde_json::from_value(value).map_err(|e| schema_error(path, e))?;
    Ok(report)
}

fn parse_time(raw: Option<&str>) -> Time {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DateTime::<Utc>::default();
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return t.with_timezone(&Utc);
    }
    let naive = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc())
        .unwrap_or_default()
}

// === Legacy shapes ===

#[derive(Debug, Deserialize)]
struct LegacySummary {
    version: SemVer,
    #[serde(default)]
    updated_at: Option<String>,
    code_analysis: LegacyCodeAnalysis,
    #[serde(default)]
    project_structure: LegacyStructure,
}

#[derive(Debug, Deserialize)]
struct LegacyCodeAnalysis {
    total_functions: usize,
    documented_functions: usize,
    #[serde(default)]
    language_breakdown: BTreeMap<String, LegacyLanguageCount>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyLanguageCount {
    #[serde(default)]
    files: usize,
    #[serde(default)]
    functions: usize,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyStructure {
    #[serde(default)]
    total_files: usize,
}

impl LegacySummary {
    fn migrate(self) -> ProjectSummary {
        let analysis = self.code_analysis;
        let documented = analysis.documented_functions.min(analysis.total_functions);
        let language_breakdown = analysis
            .language_breakdown
            .into_iter()
            .map(|(ext, count)| {
                (
                    ext.trim_start_matches('.').to_string(),
                    LanguageCount {
                        files: count.files,
                        functions: count.functions,
                    },
                )
            })
            .collect();

        ProjectSummary {
            version: self.version,
            generated_at: parse_time(self.updated_at.as_deref()),
            total_files: self.project_structure.total_files,
            total_functions: analysis.total_functions,
            documented_functions: documented,
            coverage_pct: arkival_core::coverage_pct(documented, analysis.total_functions),
            language_breakdown,
            generator_attribution: "migrated from legacy summary".to_string(),
            verbosity: Verbosity::Minimal,
            language_details: None,
            run_report: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LegacyChangelog {
    changelog_version: SemVer,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    entries: Vec<LegacyChangelogEntry>,
}

#[derive(Debug, Deserialize)]
struct LegacyChangelogEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    summary: String,
}

impl LegacyChangelog {
    fn migrate(self) -> ChangelogStore {
        let fallback_version = self.changelog_version;
        let mut sequence = 0u64;
        let count = self.entries.len();
        let entries = self
            .entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let n = entry
                    .id
                    .as_deref()
                    .and_then(|id| id.strip_prefix("change_"))
                    .and_then(|n| n.parse::<u64>().ok())
                    .unwrap_or((count - i) as u64);
                sequence = sequence.max(n);
                ChangelogEntry {
                    id: format!("change_{:03}", n),
                    version: entry
                        .version
                        .as_deref()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(fallback_version),
                    date: parse_time(entry.timestamp.as_deref()),
                    category: entry
                        .kind
                        .as_deref()
                        .and_then(|k| k.parse().ok())
                        .unwrap_or(ChangeCategory::Enhancement),
                    summary: entry.summary,
                    project_version: None,
                }
            })
            .collect();

        let mut store = ChangelogStore {
            changelog_version: self.changelog_version,
            last_updated: self.last_updated.as_deref().map(|t| parse_time(Some(t))),
            entries,
            statistics: Default::default(),
            sequence,
        };
        store.refresh_statistics();
        store
    }
}

#[derive(Debug, Deserialize)]
struct LegacySessionState {
    last_session: LegacyLastSession,
    #[serde(default)]
    project_version: Option<String>,
    #[serde(default)]
    next_agent_context: LegacyNextAgentContext,
}

#[derive(Debug, Deserialize)]
struct LegacyLastSession {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyNextAgentContext {
    #[serde(default)]
    priority_items: Vec<String>,
}

impl LegacySessionState {
    fn migrate(self) -> SessionState {
        let at = parse_time(self.last_session.timestamp.as_deref());
        SessionState {
            session_id: SessionId::new(),
            started_at: at,
            completed_at: Some(at),
            completed_tasks: Vec::new(),
            priority_items_for_next: self.next_agent_context.priority_items,
            deployment_mode: DeploymentMode::Standalone,
            outcome: self
                .last_session
                .kind
                .as_deref()
                .and_then(|k| k.parse::<SessionOutcome>().ok())
                .unwrap_or_default(),
            last_summary: Some(self.last_session.summary).filter(|s| !s.is_empty()),
            project_version: self.project_version.as_deref().and_then(|v| v.parse().ok()),
        }
    }
}
