//! Handoff state machine.
//!
//! `Idle → IncomingLoaded → Active → OutgoingCommitted → Idle`. Nothing is
//! written until [`HandoffSynchronizer::outgoing`], which stages every store
//! in memory and hands them to [`Storage::commit_handoff`] as one batch.

use arkival_core::{
    ChangeCategory, ChangelogStore, CheckpointEntry, DeploymentMode, HandoffConfig,
    MissingDocsReport, SemVer, SessionId, SessionOutcome, SessionState, AgentHandoff,
};
use arkival_storage::{HandoffBatch, Storage};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{HandoffError, Result};
use crate::priority::extract_priority_items;

/// Changelog entries inspected for open bugs in the briefing.
const UNRESOLVED_LOOKBACK: usize = 5;

/// Synchronizer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session loaded
    Idle,
    /// Previous session read, new one not started
    IncomingLoaded,
    /// A session is open and recording tasks
    Active,
    /// Stores written; returns to idle immediately
    OutgoingCommitted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::IncomingLoaded => f.write_str("incoming loaded"),
            Phase::Active => f.write_str("active"),
            Phase::OutgoingCommitted => f.write_str("outgoing committed"),
        }
    }
}

/// Documentation state as the incoming session finds it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentationStatus {
    /// A project summary exists
    pub summary_present: bool,
    /// A changelog exists
    pub changelog_present: bool,
    /// Version of the current project summary
    pub summary_version: Option<SemVer>,
    /// Project version the newest changelog entry was recorded against
    pub changelog_project_version: Option<SemVer>,
    /// Files listed in the last missing-documentation report
    pub undocumented_files: Vec<String>,
    /// Undocumented functions across those files
    pub undocumented_functions: usize,
}

impl DocumentationStatus {
    fn collect(
        summary_version: Option<SemVer>,
        changelog: Option<&ChangelogStore>,
        missing: Option<&MissingDocsReport>,
    ) -> Self {
        let (undocumented_files, undocumented_functions) = match missing {
            Some(report) => (
                report
                    .directories
                    .values()
                    .flatten()
                    .map(|f| f.path.clone())
                    .collect(),
                report.total_undocumented,
            ),
            None => (Vec::new(), 0),
        };
        Self {
            summary_present: summary_version.is_some(),
            changelog_present: changelog.is_some(),
            summary_version,
            changelog_project_version: changelog
                .and_then(|c| c.entries.first())
                .and_then(|e| e.project_version),
            undocumented_files,
            undocumented_functions,
        }
    }

    /// The newest changelog entry was recorded against the current summary.
    ///
    /// False when either document is missing, or when a scan changed the
    /// summary version after the last handoff.
    pub fn versions_consistent(&self) -> bool {
        self.summary_present
            && self.changelog_present
            && self.summary_version.is_some()
            && self.changelog_project_version == self.summary_version
    }

    /// Both documents exist, agree, and no function lacks a marker.
    pub fn is_consistent(&self) -> bool {
        self.versions_consistent() && self.undocumented_files.is_empty()
    }
}

/// What the incoming session needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingBriefing {
    /// Priority items left by the previous session
    pub priority_items: Vec<String>,
    /// Summary of the previous session
    pub previous_summary: Option<String>,
    /// How the previous session ended
    pub previous_outcome: Option<SessionOutcome>,
    /// Current changelog version
    pub changelog_version: SemVer,
    /// Bug entries among the most recent changelog entries
    pub unresolved: Vec<String>,
    /// Summary, changelog and missing-documentation check
    pub documentation: DocumentationStatus,
}

/// Input to the outgoing transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    /// Session summary
    pub summary: String,
    /// How the session ended
    pub outcome: SessionOutcome,
    /// Tasks to record in addition to those already recorded
    pub tasks: Vec<String>,
}

impl OutgoingRequest {
    /// Request with no extra tasks.
    pub fn new(summary: impl Into<String>, outcome: SessionOutcome) -> Self {
        Self {
            summary: summary.into(),
            outcome,
            tasks: Vec::new(),
        }
    }

    /// Add a task.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.tasks.push(task.into());
        self
    }
}

/// Result of a committed handoff.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingReport {
    /// Session that was closed
    pub session_id: SessionId,
    /// Changelog version after the new entry
    pub changelog_version: SemVer,
    /// Priority items handed to the next session
    pub priority_items: Vec<String>,
    /// Changelog entries moved to an archive
    pub archived_entries: usize,
}

/// Drives one session through incoming, active and outgoing.
pub struct HandoffSynchronizer<S: Storage> {
    storage: S,
    mode: DeploymentMode,
    config: HandoffConfig,
    phase: Phase,
    previous: Option<SessionState>,
    changelog: ChangelogStore,
    project_version: Option<SemVer>,
    session: Option<SessionState>,
}

impl<S: Storage> HandoffSynchronizer<S> {
    /// Create an idle synchronizer.
    pub fn new(storage: S, mode: DeploymentMode) -> Self {
        Self {
            storage,
            mode,
            config: HandoffConfig::default(),
            phase: Phase::Idle,
            previous: None,
            changelog: ChangelogStore::default(),
            project_version: None,
            session: None,
        }
    }

    /// Override retention settings.
    pub fn with_config(mut self, config: HandoffConfig) -> Self {
        self.config = config;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the previous session and build the briefing. Writes nothing.
    pub async fn incoming(&mut self) -> Result<IncomingBriefing> {
        self.expect(Phase::Idle, "load incoming state")?;

        let previous = self.storage.load_session_state().await?;
        let stored_changelog = self.storage.load_changelog().await?;
        let project_version = self.storage.load_summary().await?.map(|s| s.version);
        let missing = self.storage.load_missing_docs_report().await?;
        let documentation =
            DocumentationStatus::collect(project_version, stored_changelog.as_ref(), missing.as_ref());
        let changelog = stored_changelog.unwrap_or_default();

        let briefing = IncomingBriefing {
            priority_items: previous
                .as_ref()
                .map(|s| s.priority_items_for_next.clone())
                .unwrap_or_default(),
            previous_summary: previous.as_ref().and_then(|s| s.last_summary.clone()),
            previous_outcome: previous.as_ref().map(|s| s.outcome),
            changelog_version: changelog.changelog_version,
            unresolved: changelog
                .recent(ChangeCategory::Bug, UNRESOLVED_LOOKBACK)
                .map(|e| e.summary.clone())
                .collect(),
            documentation,
        };
        debug!(
            "Incoming: {} priority items, changelog v{}",
            briefing.priority_items.len(),
            briefing.changelog_version
        );
        if !briefing.documentation.is_consistent() {
            warn!("Documentation is not consistent: {:?}", briefing.documentation);
        }

        self.previous = previous;
        self.changelog = changelog;
        self.project_version = project_version;
        self.phase = Phase::IncomingLoaded;
        Ok(briefing)
    }

    /// Open the new session.
    pub fn begin(&mut self) -> Result<&SessionState> {
        self.expect(Phase::IncomingLoaded, "begin a session")?;

        let started_at = self
            .previous
            .as_ref()
            .and_then(|s| s.completed_at)
            .unwrap_or_else(Utc::now);
        let session = SessionState::start(self.mode, started_at);
        info!("Session {} started", session.session_id);

        self.phase = Phase::Active;
        Ok(self.session.insert(session))
    }

    /// Record a finished task in the open session.
    pub fn record_task(&mut self, task: impl Into<String>) -> Result<()> {
        self.expect(Phase::Active, "record a task")?;
        let task = task.into();
        let task = task.trim();
        if task.is_empty() {
            return Ok(());
        }
        if let Some(session) = self.session.as_mut() {
            session.completed_tasks.push(task.to_string());
        }
        Ok(())
    }

    /// Close the session and commit every handoff store at once.
    ///
    /// From `Idle` this first runs [`incoming`](Self::incoming) and
    /// [`begin`](Self::begin). On failure nothing on disk changes, the
    /// session stays open and [`HandoffError::PartialSynchronization`] is
    /// returned.
    pub async fn outgoing(&mut self, request: OutgoingRequest) -> Result<OutgoingReport> {
        let summary = request.summary.trim();
        if summary.is_empty() {
            return Err(HandoffError::EmptySummary);
        }

        if self.phase == Phase::Idle {
            self.incoming().await?;
        }
        if self.phase == Phase::IncomingLoaded {
            self.begin()?;
        }
        self.expect(Phase::Active, "hand off")?;
        let Some(mut session) = self.session.clone() else {
            return Err(HandoffError::InvalidTransition {
                phase: self.phase,
                operation: "hand off",
            });
        };

        let now = Utc::now();
        session.completed_tasks.extend(
            request
                .tasks
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );

        let mut priority_items = extract_priority_items(summary);
        if request.outcome == SessionOutcome::Unresolved {
            for task in &session.completed_tasks {
                if !priority_items.contains(task) {
                    priority_items.push(task.clone());
                }
            }
        }

        session.completed_at = Some(now);
        session.outcome = request.outcome;
        session.last_summary = Some(summary.to_string());
        session.priority_items_for_next = priority_items.clone();
        session.project_version = self.project_version;

        let category = match request.outcome {
            SessionOutcome::Completed => ChangeCategory::Feature,
            SessionOutcome::Unresolved => ChangeCategory::Bug,
        };
        let mut changelog = self.changelog.clone();
        changelog.record(category, summary, self.project_version, now);
        let archived_entries = changelog.take_overflow(self.config.changelog_retention);

        let handoff = AgentHandoff::from_state(&session, changelog.changelog_version, now);
        let checkpoint = CheckpointEntry {
            timestamp: now,
            changelog_version: changelog.changelog_version,
            project_version: self.project_version,
            category,
            summary: summary.to_string(),
        };
        let report = OutgoingReport {
            session_id: session.session_id,
            changelog_version: changelog.changelog_version,
            priority_items,
            archived_entries: archived_entries.len(),
        };

        let batch = HandoffBatch {
            session_state: session,
            handoff,
            changelog,
            archived_entries,
            checkpoint,
            checkpoint_retention: self.config.checkpoint_retention,
        };
        if let Err(source) = self.storage.commit_handoff(batch).await {
            warn!("Handoff commit failed: {}", source);
            return Err(HandoffError::PartialSynchronization { source });
        }

        self.phase = Phase::OutgoingCommitted;
        info!(
            "Session {} handed off ({}), changelog v{}",
            report.session_id, request.outcome, report.changelog_version
        );
        self.reset();
        Ok(report)
    }

    fn reset(&mut self) {
        self.previous = None;
        self.session = None;
        self.changelog = ChangelogStore::default();
        self.project_version = None;
        self.phase = Phase::Idle;
    }

    fn expect(&self, phase: Phase, operation: &'static str) -> Result<()> {
        if self.phase != phase {
            return Err(HandoffError::InvalidTransition {
                phase: self.phase,
                operation,
            });
        }
        Ok(())
    }
}
