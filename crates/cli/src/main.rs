//! Arkival CLI - documentation coverage and session handoff.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use arkival_core::{ArkivalConfig, DeploymentContext, SessionOutcome, Verbosity};
use arkival_deploy::{Resolver, CANONICAL_NAMES};
use arkival_handoff::{DocumentationStatus, HandoffError, HandoffSynchronizer, OutgoingRequest};
use arkival_scan::{IgnoreEngine, LanguageRegistry, ScanError, ScanOptions};
use arkival_storage::{JsonStorage, Storage, StorageError};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arkival")]
#[command(about = "Documentation coverage scanner and agent handoff", long_about = None)]
struct Cli {
    /// Tool directory (defaults to an arkival* directory around the working directory or the binary)
    #[arg(long, global = true)]
    tool_root: Option<PathBuf>,

    /// Working directory to resolve from
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the project and update the summary
    Scan {
        /// Keep a history copy of the prior summary even when its version is unchanged
        #[arg(long)]
        force: bool,
        /// Output size: minimal or standard
        #[arg(long)]
        verbosity: Option<Verbosity>,
    },
    /// Session handoff
    Handoff {
        #[command(subcommand)]
        action: HandoffAction,
    },
    /// Show the resolved deployment and paths
    Status,
}

#[derive(Subcommand)]
enum HandoffAction {
    /// Print what the previous session left
    Incoming,
    /// Close the session and write every handoff store
    Outgoing {
        /// Session summary
        #[arg(long)]
        summary: String,
        /// completed or unresolved
        #[arg(long, default_value = "unresolved")]
        outcome: SessionOutcome,
        /// Task worked on (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map a failure to the documented exit status.
fn exit_code(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if let Some(HandoffError::PartialSynchronization { .. }) = cause.downcast_ref::<HandoffError>() {
            return 4;
        }
        if let Some(ScanError::UnreadableRoot { .. }) = cause.downcast_ref::<ScanError>() {
            return 2;
        }
        if let Some(StorageError::Write { .. } | StorageError::Transaction { .. }) = cause.downcast_ref::<StorageError>() {
            return 3;
        }
    }
    1
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir().context("Cannot determine working directory")?,
    };
    let tool_root = match cli.tool_root {
        Some(root) => root,
        None => find_tool_root(&cwd, std::env::current_exe().ok().as_deref()),
    };
    debug!("Tool root {}", tool_root.display());

    let resolution = Resolver::new(&tool_root)
        .resolve_full(&cwd)
        .context("Failed to resolve deployment")?;
    let context = resolution.context;
    let config = resolution.config;

    match cli.command {
        Commands::Scan { force, verbosity } => {
            run_scan(&context, &config, verbosity, force).await?;
        }
        Commands::Handoff { action } => {
            let storage = JsonStorage::new(context.paths().clone());
            let mut sync = HandoffSynchronizer::new(storage, context.mode()).with_config(config.handoff.clone());
            match action {
                HandoffAction::Incoming => {
                    let briefing = sync.incoming().await?;
                    println!("Changelog version: {}", briefing.changelog_version);
                    match (&briefing.previous_summary, briefing.previous_outcome) {
                        (Some(summary), Some(outcome)) => println!("Previous session ({outcome}): {summary}"),
                        _ => println!("No previous session"),
                    }
                    print_list("Priority items", &briefing.priority_items);
                    print_list("Open bugs", &briefing.unresolved);
                    print_documentation(&briefing.documentation);
                }
                HandoffAction::Outgoing { summary, outcome, tasks } => {
                    let report = sync
                        .outgoing(OutgoingRequest { summary, outcome, tasks })
                        .await?;
                    println!("Session {} handed off ({})", report.session_id, outcome);
                    println!("Changelog version: {}", report.changelog_version);
                    if report.archived_entries > 0 {
                        println!("Archived {} changelog entries", report.archived_entries);
                    }
                    print_list("Priority items for next session", &report.priority_items);
                }
            }
        }
        Commands::Status => print_status(&context),
    }

    Ok(())
}

async fn run_scan(
    context: &DeploymentContext,
    config: &ArkivalConfig,
    verbosity: Option<Verbosity>,
    force: bool,
) -> Result<()> {
    let paths = context.paths().clone();
    let verbosity = verbosity.unwrap_or(config.scan.verbosity);
    let options = ScanOptions::from(&config.scan);
    let registry = LanguageRegistry::builtin().context("Failed to compile language registry")?;
    let ignore = IgnoreEngine::load(&paths.ignore_file);

    let root = paths.scan_root.clone();
    let outcome = tokio::task::spawn_blocking(move || arkival_scan::scan(&root, &ignore, &registry, &options))
        .await
        .context("Scan task panicked")??;

    let mut storage = JsonStorage::new(paths.clone()).with_history_retention(config.scan.history_retention);
    let prior = storage.load_summary().await.context("Failed to read previous summary")?;
    let now = Utc::now();
    let summary = arkival_scan::build(&outcome.records, prior.as_ref(), verbosity, outcome.report, now);

    if force && prior.as_ref().is_some_and(|p| p.version == summary.version) {
        let kept = storage
            .snapshot_summary()
            .await
            .context("Failed to snapshot previous summary")?;
        if kept {
            info!("Kept a history copy of summary v{}", summary.version);
        }
    }
    storage
        .save_summary(&summary)
        .await
        .with_context(|| format!("Failed to write {}", paths.summary.display()))?;

    let missing = arkival_scan::missing_docs_report(&outcome.records, config.scan.missing_docs_threshold, now);
    storage
        .save_missing_docs_report(&missing)
        .await
        .with_context(|| format!("Failed to write {}", paths.missing_docs_report.display()))?;

    println!(
        "Summary v{}: {} files, {}/{} functions documented ({:.1}%)",
        summary.version,
        summary.total_files,
        summary.documented_functions,
        summary.total_functions,
        summary.coverage_pct
    );
    let report = outcome.report;
    println!(
        "Skipped: {} binary, {} unreadable, {} oversized; {} directories pruned; {} ignore rule errors",
        report.skipped_binary,
        report.skipped_unreadable,
        report.skipped_oversized,
        report.directories_pruned,
        report.ignore_rule_errors
    );
    if !missing.is_empty() {
        println!(
            "{} files with undocumented functions in {} directories",
            missing.total_files,
            missing.directories.len()
        );
    }
    Ok(())
}

fn print_status(context: &DeploymentContext) {
    println!("Mode:        {}", context.mode());
    println!("Tool root:   {}", context.tool_root().display());
    println!("Host root:   {}", context.host_root().display());
    println!("Output root: {}", context.output_root().display());
    if let Some(meta) = context.host_metadata() {
        println!("Host:        {} ({})", meta.name, meta.declared_version);
        if !meta.tech_stack.is_empty() {
            println!("Tech stack:  {}", meta.tech_stack.join(", "));
        }
        if let Some(remote) = &meta.vcs_remote {
            println!("Remote:      {}", remote);
        }
    }
    println!();
    for (label, path) in context.paths().entries() {
        println!("  {:<22} {}", label, path.display());
    }
}

fn print_documentation(status: &DocumentationStatus) {
    let mark = |ok: bool| if ok { "ok" } else { "missing" };
    println!("Documentation:");
    println!("  summary:   {}", mark(status.summary_present));
    println!("  changelog: {}", mark(status.changelog_present));
    if status.summary_present && status.changelog_present {
        let changelog = status
            .changelog_project_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string());
        let summary = status
            .summary_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string());
        if status.versions_consistent() {
            println!("  versions:  consistent (v{summary})");
        } else {
            println!("  versions:  summary v{summary}, last changelog entry recorded at {changelog}");
        }
    }
    if status.undocumented_files.is_empty() {
        println!("  markers:   every detected function documented");
    } else {
        println!(
            "  markers:   {} undocumented functions in {} files",
            status.undocumented_functions,
            status.undocumented_files.len()
        );
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{title}:");
    for item in items {
        println!("  - {item}");
    }
}

/// Locate the tool directory when `--tool-root` is not given.
///
/// In order: the nearest ancestor of `cwd` named `arkival*`, a child of `cwd`
/// with a canonical tool name, the nearest ancestor of the binary named
/// `arkival*`, and finally `cwd` itself.
fn find_tool_root(cwd: &Path, exe: Option<&Path>) -> PathBuf {
    if let Some(dir) = arkival_ancestor(cwd) {
        return dir;
    }
    if let Some(dir) = canonical_child(cwd) {
        return dir;
    }
    exe.and_then(Path::parent)
        .and_then(arkival_ancestor)
        .unwrap_or_else(|| cwd.to_path_buf())
}

fn arkival_ancestor(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| {
            dir.file_name()
                .is_some_and(|n| n.to_string_lossy().to_lowercase().starts_with("arkival"))
        })
        .map(Path::to_path_buf)
}

fn canonical_child(dir: &Path) -> Option<PathBuf> {
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .is_some_and(|n| CANONICAL_NAMES.contains(&n.as_str()))
        })
        .collect();
    children.sort();
    children.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkival_core::{DeploymentMode, CONFIG_FILE_NAME};
    use std::fs;

    fn standalone_tool(dir: &Path) -> (PathBuf, DeploymentContext) {
        let tool = dir.join("arkival");
        fs::create_dir_all(tool.join("src")).unwrap();
        let context = Resolver::new(&tool).resolve(&tool).unwrap();
        (tool, context)
    }

    async fn load_summary(context: &DeploymentContext) -> arkival_core::ProjectSummary {
        JsonStorage::new(context.paths().clone())
            .load_summary()
            .await
            .unwrap()
            .unwrap()
    }

    fn history_len(context: &DeploymentContext) -> usize {
        match fs::read_dir(&context.paths().history_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[test]
    fn test_find_tool_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("shop/Arkival/codebase_summary");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_tool_root(&nested, None), dir.path().join("shop/Arkival"));

        let plain = dir.path().join("shop/src");
        fs::create_dir_all(&plain).unwrap();
        assert_eq!(find_tool_root(&plain, None), plain);
    }

    #[test]
    fn test_find_tool_root_from_binary_location() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("arkival-v4/target/release");
        fs::create_dir_all(&release).unwrap();
        let elsewhere = dir.path().join("work");
        fs::create_dir_all(&elsewhere).unwrap();

        let exe = release.join("arkival");
        assert_eq!(find_tool_root(&elsewhere, Some(exe.as_path())), dir.path().join("arkival-v4"));
    }

    #[test]
    fn test_host_directory_resolves_to_nested_tool() {
        let dir = tempfile::tempdir().unwrap();
        let shop = fs::canonicalize(dir.path()).unwrap().join("shop");
        fs::create_dir_all(shop.join("Arkival")).unwrap();
        fs::create_dir_all(shop.join("src")).unwrap();
        fs::write(shop.join(CONFIG_FILE_NAME), r#"{ "deployment_mode": "attached" }"#).unwrap();

        let tool_root = find_tool_root(&shop, None);
        assert_eq!(tool_root, shop.join("Arkival"));

        let from_host = Resolver::new(&tool_root).resolve(&shop).unwrap();
        let from_tool = Resolver::new(&tool_root).resolve(&tool_root).unwrap();
        assert_eq!(from_host.mode(), DeploymentMode::Attached);
        assert_eq!(from_host.output_root(), shop.join("Arkival").as_path());
        assert_eq!(from_host.paths(), from_tool.paths());
    }

    #[test]
    fn test_exit_codes() {
        let unreadable = anyhow::Error::new(ScanError::UnreadableRoot {
            path: PathBuf::from("/missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(exit_code(&unreadable), 2);

        let write = anyhow::Error::new(StorageError::Write {
            path: PathBuf::from("codebase_summary.json"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
        .context("Failed to write summary");
        assert_eq!(exit_code(&write), 3);

        let read = anyhow::Error::new(StorageError::Io(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        )))
        .context("Failed to read previous summary");
        assert_eq!(exit_code(&read), 1);

        let partial = anyhow::Error::new(HandoffError::PartialSynchronization {
            source: StorageError::Transaction {
                path: PathBuf::from("changelog_summary.json"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                rolled_back: true,
            },
        });
        assert_eq!(exit_code(&partial), 4);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn test_cli_parses_outgoing() {
        let cli = Cli::parse_from([
            "arkival",
            "handoff",
            "outgoing",
            "--summary",
            "done",
            "--outcome",
            "completed",
            "--task",
            "a",
            "--task",
            "b",
        ]);
        match cli.command {
            Commands::Handoff {
                action: HandoffAction::Outgoing { outcome, tasks, .. },
            } => {
                assert_eq!(outcome, SessionOutcome::Completed);
                assert_eq!(tasks, vec!["a", "b"]);
            }
            _ => panic!("wrong command"),
        }
    }

    #[tokio::test]
    async fn test_rescan_without_changes_keeps_version() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, context) = standalone_tool(dir.path());
        fs::write(
            tool.join("src/lib.rs"),
            "// @codebase-summary: entry\npub fn documented() {}\n\npub fn bare() {}\n",
        )
        .unwrap();
        let config = ArkivalConfig::default();

        run_scan(&context, &config, None, false).await.unwrap();
        let first = load_summary(&context).await;
        run_scan(&context, &config, None, false).await.unwrap();
        let second = load_summary(&context).await;

        assert_eq!(first.total_functions, 2);
        assert_eq!(first.documented_functions, 1);
        assert_eq!(second.version, first.version);
        assert_eq!(
            arkival_core::ProjectSummary {
                generated_at: first.generated_at,
                ..second
            },
            first
        );
        assert_eq!(history_len(&context), 0);
        assert!(context.paths().missing_docs_report.exists());
    }

    #[tokio::test]
    async fn test_rescan_after_change_bumps_and_archives() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, context) = standalone_tool(dir.path());
        let config = ArkivalConfig::default();
        fs::write(tool.join("src/lib.rs"), "pub fn one() {}\n").unwrap();
        run_scan(&context, &config, None, false).await.unwrap();

        fs::write(tool.join("src/lib.rs"), "pub fn one() {}\n\npub fn two() {}\n").unwrap();
        run_scan(&context, &config, None, false).await.unwrap();

        let summary = load_summary(&context).await;
        assert_eq!(summary.version, arkival_core::SemVer::new(1, 0, 1));
        assert_eq!(summary.total_functions, 2);
        assert_eq!(history_len(&context), 1);
    }

    #[tokio::test]
    async fn test_equal_totals_still_refresh_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, context) = standalone_tool(dir.path());
        let config = ArkivalConfig::default();
        fs::write(tool.join("src/a.rs"), "pub fn one() {}\n").unwrap();
        fs::write(tool.join("src/b.py"), "def helper():\n    pass\n").unwrap();
        run_scan(&context, &config, None, false).await.unwrap();
        let before = load_summary(&context).await;

        fs::write(tool.join("src/a.rs"), "pub fn one() {}\n\npub fn two() {}\n").unwrap();
        fs::write(tool.join("src/b.py"), "VALUE = 1\n").unwrap();
        run_scan(&context, &config, None, false).await.unwrap();
        let after = load_summary(&context).await;

        assert_eq!(after.total_functions, before.total_functions);
        assert_eq!(after.version, before.version);
        assert_eq!(after.language_breakdown["rs"].functions, 2);
        assert_eq!(after.language_breakdown["py"].functions, 0);
        assert!(after.generated_at >= before.generated_at);
    }

    #[tokio::test]
    async fn test_missing_docs_report_clears_once_documented() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, context) = standalone_tool(dir.path());
        let config = ArkivalConfig::default();
        fs::write(tool.join("src/a.rs"), "pub fn bare() {}\n").unwrap();
        run_scan(&context, &config, None, false).await.unwrap();

        let storage = JsonStorage::new(context.paths().clone());
        let report = storage.load_missing_docs_report().await.unwrap().unwrap();
        assert_eq!(report.total_files, 1);

        fs::write(tool.join("src/a.rs"), "// @codebase-summary: entry\npub fn bare() {}\n").unwrap();
        run_scan(&context, &config, None, false).await.unwrap();

        let report = storage.load_missing_docs_report().await.unwrap().unwrap();
        assert!(report.is_empty());
        assert_eq!(report.total_files, 0);
    }

    #[tokio::test]
    async fn test_force_keeps_history_copy() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, context) = standalone_tool(dir.path());
        let config = ArkivalConfig::default();
        fs::write(tool.join("src/lib.rs"), "pub fn one() {}\n").unwrap();

        run_scan(&context, &config, None, true).await.unwrap();
        assert_eq!(history_len(&context), 0);
        run_scan(&context, &config, None, true).await.unwrap();
        assert_eq!(history_len(&context), 1);
        assert_eq!(load_summary(&context).await.version, arkival_core::SemVer::INITIAL);
    }
}
