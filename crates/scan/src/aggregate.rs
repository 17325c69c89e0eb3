//! Folding file records into a project summary.

use std::collections::BTreeMap;

use arkival_core::{
    coverage_pct, FileRecord, LanguageCount, LanguageDetail, MissingDocsFile, MissingDocsReport,
    ProjectSummary, RunReport, SemVer, Time, Verbosity,
};
use tracing::debug;

/// Attribution written into every summary.
pub const GENERATOR: &str = concat!("arkival-scan ", env!("CARGO_PKG_VERSION"));

/// Build a summary from path-sorted records.
///
/// The version starts at `1.0.0`, stays put when the counts match `prior`,
/// and otherwise takes the prior version with the patch bumped.
pub fn build(
    records: &[FileRecord],
    prior: Option<&ProjectSummary>,
    verbosity: Verbosity,
    report: RunReport,
    generated_at: Time,
) -> ProjectSummary {
    let mut breakdown: BTreeMap<String, LanguageCount> = BTreeMap::new();
    let mut details: BTreeMap<String, LanguageDetail> = BTreeMap::new();
    let mut total_functions = 0;
    let mut documented_functions = 0;

    for record in records {
        total_functions += record.total_functions;
        documented_functions += record.documented_count;

        let count = breakdown.entry(record.language.clone()).or_default();
        count.files += 1;
        count.functions += record.total_functions;

        let detail = details.entry(record.language.clone()).or_default();
        detail.files += 1;
        detail.functions += record.total_functions;
        detail.documented += record.documented_count;
        detail.lines_of_code += record.lines_of_code;
    }
    for detail in details.values_mut() {
        detail.coverage_pct = coverage_pct(detail.documented, detail.functions);
    }

    let mut summary = ProjectSummary {
        version: SemVer::INITIAL,
        generated_at,
        total_files: records.len(),
        total_functions,
        documented_functions,
        coverage_pct: coverage_pct(documented_functions, total_functions),
        language_breakdown: breakdown,
        generator_attribution: GENERATOR.to_string(),
        verbosity,
        language_details: None,
        run_report: None,
    };
    if verbosity == Verbosity::Standard {
        summary.language_details = Some(details);
        summary.run_report = Some(report);
    }

    summary.version = match prior {
        None => SemVer::INITIAL,
        Some(prior) if prior.same_counts(&summary) => prior.version,
        Some(prior) => prior.version.bump_patch(),
    };
    debug!(
        "Summary v{}: {} files, {}/{} functions documented",
        summary.version, summary.total_files, summary.documented_functions, summary.total_functions
    );
    summary
}

/// Files with more than `threshold` undocumented functions, by directory.
pub fn missing_docs_report(records: &[FileRecord], threshold: usize, generated_at: Time) -> MissingDocsReport {
    let mut directories: BTreeMap<String, Vec<MissingDocsFile>> = BTreeMap::new();
    let mut total_files = 0;
    let mut total_undocumented = 0;

    for record in records {
        let undocumented = record.undocumented_count();
        if undocumented == 0 || undocumented <= threshold {
            continue;
        }
        total_files += 1;
        total_undocumented += undocumented;
        directories
            .entry(record.directory().to_string())
            .or_default()
            .push(MissingDocsFile {
                path: record.path.clone(),
                undocumented,
                total: record.total_functions,
            });
    }

    MissingDocsReport {
        generated_at,
        threshold,
        total_files,
        total_undocumented,
        directories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(path: &str, language: &str, total: usize, documented: usize) -> FileRecord {
        let names: Vec<String> = (0..total).map(|i| format!("f{i}")).collect();
        FileRecord {
            path: path.to_string(),
            language: language.to_string(),
            undocumented: names[documented..].to_vec(),
            function_names: names,
            documented_count: documented,
            total_functions: total,
            lines_of_code: total * 3,
        }
    }

    fn at() -> Time {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_summary_is_initial_version() {
        let records = vec![record("a.rs", "rs", 4, 1), record("b.py", "py", 2, 2)];
        let summary = build(&records, None, Verbosity::Standard, RunReport::default(), at());

        assert_eq!(summary.version, SemVer::INITIAL);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_functions, 6);
        assert_eq!(summary.documented_functions, 3);
        assert_eq!(summary.coverage_pct, 50.0);
        assert_eq!(summary.language_breakdown["rs"].functions, 4);
        assert_eq!(summary.language_details.as_ref().unwrap()["py"].coverage_pct, 100.0);
        assert!(summary.generator_attribution.starts_with("arkival-scan "));
    }

    #[test]
    fn test_unchanged_counts_keep_version() {
        let records = vec![record("a.rs", "rs", 4, 1)];
        let first = build(&records, None, Verbosity::Standard, RunReport::default(), at());
        let second = build(&records, Some(&first), Verbosity::Standard, RunReport::default(), at());
        assert_eq!(second.version, first.version);
    }

    #[test]
    fn test_changed_counts_bump_patch() {
        let first = build(&[record("a.rs", "rs", 4, 1)], None, Verbosity::Minimal, RunReport::default(), at());
        let second = build(
            &[record("a.rs", "rs", 4, 2)],
            Some(&first),
            Verbosity::Minimal,
            RunReport::default(),
            at(),
        );
        assert_eq!(second.version, SemVer::new(1, 0, 1));
    }

    #[test]
    fn test_minimal_verbosity_omits_details() {
        let summary = build(&[record("a.rs", "rs", 1, 0)], None, Verbosity::Minimal, RunReport::default(), at());
        assert!(summary.language_details.is_none());
        assert!(summary.run_report.is_none());
        assert_eq!(summary.language_breakdown.len(), 1);
    }

    #[test]
    fn test_empty_scan_has_zero_coverage() {
        let summary = build(&[], None, Verbosity::Standard, RunReport::default(), at());
        assert_eq!(summary.total_functions, 0);
        assert_eq!(summary.coverage_pct, 0.0);
    }

    #[test]
    fn test_missing_docs_groups_by_directory() {
        let records = vec![
            record("main.rs", "rs", 2, 0),
            record("src/a.rs", "rs", 3, 1),
            record("src/b.rs", "rs", 2, 2),
            record("src/net/c.go", "go", 5, 0),
        ];
        let report = missing_docs_report(&records, 0, at());
        assert_eq!(report.total_files, 3);
        assert_eq!(report.total_undocumented, 9);
        assert_eq!(report.directories["."][0].path, "main.rs");
        assert_eq!(report.directories["src"].len(), 1);
        assert_eq!(report.directories["src/net"][0].undocumented, 5);

        let strict = missing_docs_report(&records, 2, at());
        assert_eq!(strict.total_files, 1);
        assert!(strict.directories.contains_key("src/net"));
    }

    #[test]
    fn test_fully_documented_project_has_empty_report() {
        let report = missing_docs_report(&[record("a.rs", "rs", 2, 2)], 0, at());
        assert!(report.is_empty());
    }
}
