//! Priority items for the next session.

/// Words that mark a phrase as a priority.
pub const PRIORITY_KEYWORDS: &[&str] = &[
    "urgent",
    "critical",
    "important",
    "fix",
    "bug",
    "error",
    "complete",
    "todo",
    "blocked",
];

const CONTEXT_WORDS: usize = 5;
const MAX_ITEMS: usize = 3;

/// Extract up to three keyword phrases from a session summary.
///
/// Each phrase is the keyword plus the words following it, five words in
/// total, lowercased. A keyword that ends the summary has no context and is
/// skipped.
pub fn extract_priority_items(summary: &str) -> Vec<String> {
    let lowered = summary.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    words
        .iter()
        .enumerate()
        .filter(|(i, word)| {
            let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
            PRIORITY_KEYWORDS.contains(&bare) && i + 1 < words.len()
        })
        .map(|(i, _)| words[i..(i + CONTEXT_WORDS).min(words.len())].join(" "))
        .take(MAX_ITEMS)
        .collect()
}
