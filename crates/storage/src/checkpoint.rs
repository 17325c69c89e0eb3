//! Rolling markdown checkpoint log.

use arkival_core::CheckpointEntry;

const HEADER: &str = "# Arkival Checkpoint Log\n\n\
*Generated by: arkival-storage*\n\n\
Newest checkpoints first. Older sections are pruned automatically.\n\n";

/// True for lines that open a checkpoint section, automated or manual.
fn is_section_start(line: &str) -> bool {
    line.starts_with("## ") && line.contains("Checkpoint")
}

/// Split a log into its checkpoint sections, dropping the header.
pub fn sections(log: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    for line in log.lines() {
        if is_section_start(line) {
            if let Some(done) = current.take() {
                out.push(done);
            }
            current = Some(String::new());
        }
        if let Some(section) = current.as_mut() {
            section.push_str(line);
            section.push('\n');
        }
    }
    if let Some(done) = current {
        out.push(done);
    }
    out
}

/// Section headings, newest first.
pub fn headings(log: &str) -> Vec<String> {
    log.lines()
        .filter(|l| is_section_start(l))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .collect()
}

/// New log content with `entry` first and at most `retention` sections.
pub fn prepend(existing: Option<&str>, entry: &CheckpointEntry, retention: usize) -> String {
    let mut kept = vec![entry.render()];
    if let Some(log) = existing {
        kept.extend(sections(log));
    }
    kept.truncate(retention.max(1));

    let mut out = String::from(HEADER);
    for section in kept {
        out.push_str(section.trim_end());
        out.push_str("\n\n");
    }
    out
}
