//! JSON file storage implementation.
//!
//! Documents live at the locations named by the deployment's
//! [`OutputPaths`]. Summaries replaced by a newer version are copied into
//! the history directory first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arkival_core::{
    AgentHandoff, ChangelogStore, MissingDocsReport, OutputPaths, ProjectSummary, SemVer,
    SessionState,
};
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{Result, Storage, StorageError};
use crate::checkpoint;
use crate::fs::{read_optional, write_atomic, Filesystem, RetryPolicy, TokioFs};
use crate::schema::{
    decode_changelog, decode_handoff, decode_missing_docs, decode_session, decode_summary,
    ChangelogArchive, ChangelogArchiveDocument, ChangelogDocument, HandoffDocument,
    MissingDocsDocument, SessionDocument, SummaryDocument,
};
use crate::trait_::HandoffBatch;
use crate::transaction::Transaction;

const HISTORY_PREFIX: &str = "codebase_summary_v";

/// File-based JSON storage backend.
pub struct JsonStorage {
    paths: OutputPaths,
    filesystem: Arc<dyn Filesystem>,
    retry: RetryPolicy,
    history_retention: usize,
}

impl JsonStorage {
    /// Create storage over a resolved path table. Nothing is created on disk
    /// until the first write.
    pub fn new(paths: OutputPaths) -> Self {
        Self {
            paths,
            filesystem: Arc::new(TokioFs),
            retry: RetryPolicy::default(),
            history_retention: 6,
        }
    }

    /// Route writes through a different filesystem.
    pub fn with_filesystem(mut self, filesystem: Arc<dyn Filesystem>) -> Self {
        self.filesystem = filesystem;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Number of archived summaries to keep.
    pub fn with_history_retention(mut self, retention: usize) -> Self {
        self.history_retention = retention;
        self
    }

    /// Path table in use.
    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(path, &bytes).await
    }

    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        write_atomic(self.filesystem.as_ref(), &self.retry, path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Copy the current summary into the history directory even though its
    /// version has not changed. Returns false when there is no summary yet.
    pub async fn snapshot_summary(&self) -> Result<bool> {
        let path = &self.paths.summary;
        let Some(raw) = read_optional(path).await? else {
            return Ok(false);
        };
        let prior = decode_summary(path, &raw)?;
        self.archive_summary(&raw, prior.version).await?;
        Ok(true)
    }

    /// Copy the current summary into the history directory and prune.
    async fn archive_summary(&self, raw: &[u8], version: SemVer) -> Result<()> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let target = self
            .paths
            .history_dir
            .join(format!("{}{}_{}.json", HISTORY_PREFIX, version, stamp));
        self.write_bytes(&target, raw).await?;
        info!("Archived summary v{} to {}", version, target.display());
        self.prune_history().await
    }

    async fn prune_history(&self) -> Result<()> {
        let mut files = Vec::new();
        let mut rd = match fs::read_dir(&self.paths.history_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = rd.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(HISTORY_PREFIX) || !name.ends_with(".json") {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            files.push((modified, name, entry.path()));
        }
        if files.len() <= self.history_retention {
            return Ok(());
        }

        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        for (_, name, path) in files.into_iter().skip(self.history_retention) {
            fs::remove_file(&path).await?;
            debug!("Removed old history file {}", name);
        }
        Ok(())
    }

    fn archive_path(&self, project_version: Option<SemVer>) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let version = project_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.paths
            .changelog_archive_dir
            .join(format!("changelog_archive_{}_v{}.json", stamp, version))
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn load_summary(&self) -> Result<Option<ProjectSummary>> {
        let path = &self.paths.summary;
        match read_optional(path).await? {
            Some(raw) => Ok(Some(decode_summary(path, &raw)?)),
            None => Ok(None),
        }
    }

    async fn save_summary(&mut self, summary: &ProjectSummary) -> Result<()> {
        let path = self.paths.summary.clone();
        if let Some(raw) = read_optional(&path).await? {
            match decode_summary(&path, &raw) {
                Ok(prior) if prior.version != summary.version => {
                    self.archive_summary(&raw, prior.version).await?;
                }
                Ok(_) => {}
                Err(e) => warn!("Not archiving unreadable prior summary: {}", e),
            }
        }

        self.write_json(&path, &SummaryDocument::V2(summary.clone())).await?;
        info!("Wrote summary v{} to {}", summary.version, path.display());
        Ok(())
    }

    async fn load_missing_docs_report(&self) -> Result<Option<MissingDocsReport>> {
        let path = &self.paths.missing_docs_report;
        match read_optional(path).await? {
            Some(raw) => Ok(Some(decode_missing_docs(path, &raw)?)),
            None => Ok(None),
        }
    }

    async fn save_missing_docs_report(&mut self, report: &MissingDocsReport) -> Result<()> {
        let path = self.paths.missing_docs_report.clone();
        self.write_json(&path, &MissingDocsDocument::V1(report.clone())).await
    }

    async fn load_session_state(&self) -> Result<Option<SessionState>> {
        let path = &self.paths.session_state;
        match read_optional(path).await? {
            Some(raw) => Ok(Some(decode_session(path, &raw)?)),
            None => Ok(None),
        }
    }

    async fn load_changelog(&self) -> Result<Option<ChangelogStore>> {
        let path = &self.paths.changelog;
        match read_optional(path).await? {
            Some(raw) => Ok(Some(decode_changelog(path, &raw)?)),
            None => Ok(None),
        }
    }

    async fn load_handoff(&self) -> Result<Option<AgentHandoff>> {
        let path = &self.paths.handoff;
        match read_optional(path).await? {
            Some(raw) => Ok(Some(decode_handoff(path, &raw)?)),
            None => Ok(None),
        }
    }

    async fn list_checkpoints(&self) -> Result<Vec<String>> {
        match read_optional(&self.paths.checkpoint_log).await? {
            Some(raw) => Ok(checkpoint::headings(&String::from_utf8_lossy(&raw))),
            None => Ok(Vec::new()),
        }
    }

    async fn commit_handoff(&mut self, batch: HandoffBatch) -> Result<()> {
        let existing_log = read_optional(&self.paths.checkpoint_log)
            .await?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned());
        let log = checkpoint::prepend(
            existing_log.as_deref(),
            &batch.checkpoint,
            batch.checkpoint_retention,
        );

        let mut tx = Transaction::new(self.filesystem.as_ref(), self.retry);
        tx.stage_json(&self.paths.session_state, &SessionDocument::V2(batch.session_state))?;
        tx.stage_json(&self.paths.handoff, &HandoffDocument::V1(batch.handoff))?;
        tx.stage_json(&self.paths.changelog, &ChangelogDocument::V2(batch.changelog))?;
        if !batch.archived_entries.is_empty() {
            let archive = ChangelogArchive {
                archived_at: batch.checkpoint.timestamp,
                project_version: batch.checkpoint.project_version,
                archived_entries_count: batch.archived_entries.len(),
                entries: batch.archived_entries,
            };
            let path = self.archive_path(archive.project_version);
            info!("Archiving {} changelog entries to {}", archive.archived_entries_count, path.display());
            tx.stage_json(path, &ChangelogArchiveDocument::V1(archive))?;
        }
        tx.stage(&self.paths.checkpoint_log, log.into_bytes());

        tx.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testing::FlakyFs;
    use crate::StorageError;
    use arkival_core::{
        ChangeCategory, CheckpointEntry, DeploymentContext, DeploymentMode, SessionOutcome,
        Verbosity,
    };
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn storage(root: &Path) -> JsonStorage {
        let ctx = DeploymentContext::standalone(root);
        JsonStorage::new(ctx.paths().clone()).with_retry(RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(1),
        })
    }

    fn summary(version: SemVer, functions: usize) -> ProjectSummary {
        ProjectSummary {
            version,
            generated_at: Utc::now(),
            total_files: 1,
            total_functions: functions,
            documented_functions: 0,
            coverage_pct: 0.0,
            language_breakdown: BTreeMap::new(),
            generator_attribution: "test".to_string(),
            verbosity: Verbosity::Minimal,
            language_details: None,
            run_report: None,
        }
    }

    fn batch(summary_text: &str, changelog: ChangelogStore) -> HandoffBatch {
        let now = Utc::now();
        let mut state = SessionState::start(DeploymentMode::Standalone, now);
        state.completed_at = Some(now);
        state.outcome = SessionOutcome::Completed;
        state.last_summary = Some(summary_text.to_string());
        let handoff = AgentHandoff::from_state(&state, changelog.changelog_version, now);
        HandoffBatch {
            checkpoint: CheckpointEntry {
                timestamp: now,
                changelog_version: changelog.changelog_version,
                project_version: None,
                category: ChangeCategory::Feature,
                summary: summary_text.to_string(),
            },
            session_state: state,
            handoff,
            changelog,
            archived_entries: Vec::new(),
            checkpoint_retention: 20,
        }
    }

    #[tokio::test]
    async fn test_missing_documents_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        assert!(storage.load_summary().await.unwrap().is_none());
        assert!(storage.load_session_state().await.unwrap().is_none());
        assert!(storage.load_changelog().await.unwrap().is_none());
        assert!(storage.load_handoff().await.unwrap().is_none());
        assert!(storage.load_missing_docs_report().await.unwrap().is_none());
        assert!(storage.list_checkpoints().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        let s = summary(SemVer::INITIAL, 3);

        storage.save_summary(&s).await.unwrap();

        assert_eq!(storage.load_summary().await.unwrap(), Some(s));
    }

    #[tokio::test]
    async fn test_missing_docs_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        let report = MissingDocsReport {
            generated_at: Utc::now(),
            threshold: 0,
            total_files: 0,
            total_undocumented: 0,
            directories: BTreeMap::new(),
        };

        storage.save_missing_docs_report(&report).await.unwrap();

        assert_eq!(storage.load_missing_docs_report().await.unwrap(), Some(report));
    }

    #[tokio::test]
    async fn test_new_version_archives_prior_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path()).with_history_retention(2);

        let mut version = SemVer::INITIAL;
        for functions in 0..5 {
            storage.save_summary(&summary(version, functions)).await.unwrap();
            version = version.bump_patch();
        }

        let history: Vec<_> = std::fs::read_dir(&storage.paths().history_dir)
            .unwrap()
            .collect();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_same_version_is_not_archived() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        storage.save_summary(&summary(SemVer::INITIAL, 1)).await.unwrap();
        storage.save_summary(&summary(SemVer::INITIAL, 1)).await.unwrap();
        assert!(!storage.paths().history_dir.exists());
    }

    #[tokio::test]
    async fn test_snapshot_archives_unchanged_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        assert!(!storage.snapshot_summary().await.unwrap());

        storage.save_summary(&summary(SemVer::INITIAL, 1)).await.unwrap();
        assert!(storage.snapshot_summary().await.unwrap());

        let history: Vec<String> = std::fs::read_dir(&storage.paths().history_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(history.len(), 1);
        assert!(history[0].starts_with("codebase_summary_v1.0.0_"));
    }

    #[tokio::test]
    async fn test_malformed_summary_is_not_replaced_silently() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        std::fs::write(&storage.paths().summary, b"{ broken").unwrap();

        let err = storage.load_summary().await.unwrap_err();
        assert!(matches!(err, StorageError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_commit_handoff_writes_every_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        let mut changelog = ChangelogStore::default();
        changelog.record(ChangeCategory::Feature, "shipped", None, Utc::now());

        storage.commit_handoff(batch("shipped", changelog)).await.unwrap();

        let state = storage.load_session_state().await.unwrap().unwrap();
        assert_eq!(state.last_summary.as_deref(), Some("shipped"));
        let handoff = storage.load_handoff().await.unwrap().unwrap();
        assert_eq!(handoff.session_id, state.session_id);
        let changelog = storage.load_changelog().await.unwrap().unwrap();
        assert_eq!(changelog.entries.len(), 1);
        assert_eq!(storage.list_checkpoints().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_handoff_archives_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        let mut changelog = ChangelogStore::default();
        for i in 0..4 {
            changelog.record(ChangeCategory::Feature, format!("e{i}"), None, Utc::now());
        }
        let overflow = changelog.take_overflow(2);
        let mut b = batch("e3", changelog);
        b.archived_entries = overflow;

        storage.commit_handoff(b).await.unwrap();

        let archives: Vec<_> = std::fs::read_dir(&storage.paths().changelog_archive_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(archives.len(), 1);
        assert!(archives[0].starts_with("changelog_archive_"));
        assert!(archives[0].ends_with("_vunknown.json"));
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_stores() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        let mut changelog = ChangelogStore::default();
        changelog.record(ChangeCategory::Feature, "first", None, Utc::now());
        storage.commit_handoff(batch("first", changelog.clone())).await.unwrap();

        let before_state = std::fs::read(&storage.paths().session_state).unwrap();
        let before_handoff = std::fs::read(&storage.paths().handoff).unwrap();
        let before_changelog = std::fs::read(&storage.paths().changelog).unwrap();

        let flaky = Arc::new(FlakyFs::failing_write(3, std::io::ErrorKind::PermissionDenied));
        let mut storage = storage.with_filesystem(flaky);
        changelog.record(ChangeCategory::Bug, "second", None, Utc::now());
        let err = storage.commit_handoff(batch("second", changelog)).await.unwrap_err();
        assert!(matches!(err, StorageError::Transaction { .. }));

        assert_eq!(std::fs::read(&storage.paths().session_state).unwrap(), before_state);
        assert_eq!(std::fs::read(&storage.paths().handoff).unwrap(), before_handoff);
        assert_eq!(std::fs::read(&storage.paths().changelog).unwrap(), before_changelog);
        assert_eq!(storage.list_checkpoints().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summary_write_failure_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let flaky = Arc::new(FlakyFs::failing_write(1, std::io::ErrorKind::PermissionDenied));
        let mut storage = storage(dir.path()).with_filesystem(flaky);

        let err = storage.save_summary(&summary(SemVer::INITIAL, 1)).await.unwrap_err();
        match err {
            StorageError::Write { path, .. } => assert_eq!(path, storage.paths().summary),
            other => panic!("expected a write error, got {other:?}"),
        }
    }
}
