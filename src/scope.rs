//! Owned-scope glob matching and runtime scope expansions.
//!
//! Glob semantics are deliberately narrow: `/` is the only separator, `**`
//! matches zero or more whole path segments, `*` matches within a segment,
//! every other character is literal, and patterns are anchored to the full
//! relative path.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use regex::Regex;

/// Translate one glob pattern into an anchored regex.
fn glob_to_regex(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.split('/').collect();
    let mut out = String::from("^");
    let mut need_sep = false;
    for (idx, seg) in segments.iter().enumerate() {
        let is_last = idx + 1 == segments.len();
        if *seg == "**" {
            if is_last {
                if need_sep {
                    // Optional tail: `src/**` also matches `src` itself.
                    out.push_str("(?:/.*)?");
                } else {
                    out.push_str(".*");
                }
            } else {
                if need_sep {
                    out.push('/');
                    need_sep = false;
                }
                // Zero or more whole segments, each with its separator.
                out.push_str("(?:[^/]+/)*");
            }
        } else {
            if need_sep {
                out.push('/');
            }
            for ch in seg.chars() {
                if ch == '*' {
                    out.push_str("[^/]*");
                } else {
                    out.push_str(&regex::escape(&ch.to_string()));
                }
            }
            need_sep = true;
        }
    }
    out.push('$');
    out
}

/// Whether `rel_path` matches any of the given glob patterns.
///
/// Unparseable patterns are skipped (they can only arise from a corrupted
/// translation, not from user input, since everything non-glob is escaped).
pub fn matches_any(globs: &[String], rel_path: &str) -> bool {
    globs.iter().any(|g| {
        Regex::new(&glob_to_regex(g))
            .map(|re| re.is_match(rel_path))
            .unwrap_or(false)
    })
}

/// A path rendered relative to the working directory, POSIX-normalized.
///
/// Absolute paths under `cwd` are relativized; paths outside `cwd` or
/// already-relative paths are normalized as-is.
pub fn relative_posix(cwd: &Path, path: &str) -> String {
    let cleaned = path.trim().replace('\\', "/");
    let candidate = Path::new(&cleaned);
    let rel = if candidate.is_absolute() {
        candidate
            .strip_prefix(cwd)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or(cleaned.clone())
    } else {
        cleaned.clone()
    };
    let rel = rel.replace('\\', "/");
    rel.strip_prefix("./").unwrap_or(&rel).to_string()
}

/// Human-approved runtime additions to intents' owned scopes.
///
/// Keyed by intent id. Grows only, lives as long as the engine that owns it,
/// and is never persisted. `clear` exists for test isolation.
#[derive(Debug, Default)]
pub struct ScopeExpansions {
    inner: Mutex<HashMap<String, Vec<String>>>,
}

impl ScopeExpansions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record approved globs for an intent.
    pub fn approve(&self, intent_id: &str, globs: &[String]) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map.entry(intent_id.to_string()).or_default();
        for glob in globs {
            if !entry.contains(glob) {
                entry.push(glob.clone());
            }
        }
    }

    /// All approved globs for an intent, in approval order.
    pub fn for_intent(&self, intent_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(intent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every approved expansion.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
