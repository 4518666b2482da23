//! Normalization of free-text maintenance advice.

use std::collections::HashSet;

const REMEDY_LABEL: &str = "remedy:";
const PROBLEM_LABEL: &str = "problem:";

/// Turn a recommendation blob into deduplicated, actionable lines.
///
/// Lines are split on newlines, blank lines are dropped, one leading
/// `Remedy:` label and then one leading `Problem:` label are stripped
/// (case-insensitive, together with the whitespace that follows), lines left
/// empty are dropped, and exact duplicates are removed keeping the first
/// occurrence. Recomputed on every call.
#[must_use]
pub fn format_recommendation(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = strip_label(line, REMEDY_LABEL).trim();
            strip_label(line, PROBLEM_LABEL).trim()
        })
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(ToString::to_string)
        .collect()
}

/// [`format_recommendation`] for a possibly absent recommendation.
#[must_use]
pub fn format_optional_recommendation(text: Option<&str>) -> Vec<String> {
    text.map(format_recommendation).unwrap_or_default()
}

fn strip_label<'a>(line: &'a str, label: &str) -> &'a str {
    match line.get(..label.len()) {
        Some(head) if head.eq_ignore_ascii_case(label) => line[label.len()..].trim_start(),
        _ => line,
    }
}
