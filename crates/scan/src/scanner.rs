//! Filesystem walk and per-file function detection.

use std::collections::HashSet;
use std::path::{Component, Path};

use arkival_core::{FileRecord, RunReport, ScanConfig};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ScanError, UnreadableFileError};
use crate::ignore::IgnoreEngine;
use crate::registry::{Language, LanguageRegistry};

/// Bytes inspected for a NUL when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Scan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Files larger than this are skipped
    pub max_file_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
        }
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes,
        }
    }
}

/// Records for every eligible file plus the run counters.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// One record per analyzed file, sorted by path
    pub records: Vec<FileRecord>,
    /// Skip and prune counters
    pub report: RunReport,
}

/// Detection result for a single source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAnalysis {
    /// Unique names, in first-seen order
    pub function_names: Vec<String>,
    /// Names with a marker in their window
    pub documented: Vec<String>,
    /// Names without one
    pub undocumented: Vec<String>,
    /// Line count
    pub lines_of_code: usize,
}

/// Detect functions in `text` and check each one for a marker.
///
/// Every rule runs once per line. A name counts once, at its first
/// occurrence. The marker search window around a function is clipped at the
/// previous and next detected function lines.
pub fn analyze_source(text: &str, language: &Language) -> FileAnalysis {
    let lines: Vec<&str> = text.lines().collect();
    let mut seen = HashSet::new();
    let mut first_lines: Vec<(usize, &str)> = Vec::new();
    let mut function_lines: Vec<usize> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        for rule in &language.rules {
            let Some(name) = rule.capture(line) else {
                continue;
            };
            if function_lines.last() != Some(&idx) {
                function_lines.push(idx);
            }
            if seen.insert(name) {
                first_lines.push((idx, name));
            }
        }
    }

    let marked: Vec<bool> = lines.iter().map(|l| language.marker.is_match(l)).collect();
    let window = language.window;
    let mut analysis = FileAnalysis {
        lines_of_code: lines.len(),
        ..Default::default()
    };

    for (idx, name) in first_lines {
        // function_lines is sorted and contains idx.
        let pos = function_lines.partition_point(|&l| l < idx);
        let floor = if pos > 0 { function_lines[pos - 1] + 1 } else { 0 };
        let ceiling = function_lines
            .get(pos + 1)
            .map(|next| next - 1)
            .unwrap_or(lines.len().saturating_sub(1));

        let start = idx.saturating_sub(window.above).max(floor);
        let end = (idx + window.below).min(ceiling);
        let documented = marked[start..=end].iter().any(|m| *m);

        analysis.function_names.push(name.to_string());
        if documented {
            analysis.documented.push(name.to_string());
        } else {
            analysis.undocumented.push(name.to_string());
        }
    }

    analysis
}

/// Walk `root` and analyze every eligible file.
///
/// Read-only. Returns [`ScanError::UnreadableRoot`] when the root cannot be
/// listed; every other failure is counted in the run report and skipped.
pub fn scan(
    root: &Path,
    ignore: &IgnoreEngine,
    registry: &LanguageRegistry,
    options: &ScanOptions,
) -> Result<ScanOutcome> {
    check_root(root)?;
    info!("Scanning {}", root.display());

    let mut report = RunReport {
        ignore_rule_errors: ignore.errors().len(),
        ..Default::default()
    };
    let mut records = Vec::new();
    let mut pruned = 0usize;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if ignore.should_ignore_path(relative) {
                if entry.file_type().is_dir() {
                    debug!("Pruned {}", relative.display());
                    pruned += 1;
                }
                return false;
            }
            true
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Walk error: {}", e);
                report.skipped_unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) else {
            continue;
        };
        let Some(language) = registry.language_for(&ext) else {
            continue;
        };

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                report.skipped_unreadable += 1;
                continue;
            }
        };
        if size > options.max_file_size {
            debug!("Skipping oversized file {} ({} bytes)", path.display(), size);
            report.skipped_oversized += 1;
            continue;
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = UnreadableFileError {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                report.skipped_unreadable += 1;
                continue;
            }
        };
        if looks_binary(&bytes) {
            debug!("Skipping binary file {}", path.display());
            report.skipped_binary += 1;
            continue;
        }

        let text = String::from_utf8_lossy(&bytes);
        let analysis = analyze_source(&text, language);
        let relative = relative_path(path.strip_prefix(root).unwrap_or(path));

        report.files_scanned += 1;
        records.push(FileRecord {
            path: relative,
            language: ext,
            total_functions: analysis.function_names.len(),
            documented_count: analysis.documented.len(),
            function_names: analysis.function_names,
            undocumented: analysis.undocumented,
            lines_of_code: analysis.lines_of_code,
        });
    }

    report.directories_pruned = pruned;
    records.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        "Scanned {} files ({} skipped, {} directories pruned)",
        report.files_scanned,
        report.skipped_files(),
        report.directories_pruned
    );
    Ok(ScanOutcome { records, report })
}

fn check_root(root: &Path) -> Result<()> {
    let unreadable = |source: std::io::Error| ScanError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    };
    let meta = std::fs::metadata(root).map_err(unreadable)?;
    if !meta.is_dir() {
        return Err(unreadable(std::io::Error::other("not a directory")));
    }
    std::fs::read_dir(root).map_err(unreadable)?;
    Ok(())
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

fn relative_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
