//! Unified-diff helpers: preview generation, hunk parsing, span lookup.

use std::sync::LazyLock;

use regex::Regex;

use crate::hashing::LineRange;

/// `@@ -a,b +c,d @@` with the counts optional.
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex")
});

/// Render a unified diff of `old` vs `new` with the given context width,
/// truncated to the first `max_lines` lines.
pub fn unified_preview(old: &str, new: &str, context: usize, max_lines: usize) -> String {
    let patch = diffy::DiffOptions::new()
        .set_context_len(context)
        .create_patch(old, new);
    patch
        .to_string()
        .lines()
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the post-image line ranges of every hunk in a unified diff.
///
/// Each `@@ -a,b +c,d @@` header yields `{c, c + max(1, d) - 1}`; a missing
/// post-image count is treated as 1.
pub fn hunk_ranges(diff: &str) -> Vec<LineRange> {
    HUNK_HEADER
        .captures_iter(diff)
        .filter_map(|caps| {
            let start: usize = caps.get(1)?.as_str().parse().ok()?;
            let count: usize = match caps.get(2) {
                Some(m) => m.as_str().parse().ok()?,
                None => 1,
            };
            Some(LineRange::new(start, start + count.max(1) - 1))
        })
        .collect()
}

/// The 1-indexed line span of the first occurrence of `needle` in `haystack`.
pub fn line_span_of(haystack: &str, needle: &str) -> Option<LineRange> {
    if needle.is_empty() {
        return None;
    }
    let at = haystack.find(needle)?;
    let start_line = haystack[..at].bytes().filter(|b| *b == b'\n').count() + 1;
    let needle_lines = needle.lines().count().max(1);
    Some(LineRange::new(start_line, start_line + needle_lines - 1))
}
