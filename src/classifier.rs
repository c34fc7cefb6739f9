//! Deterministic command classification.
//!
//! Pure, synchronous analysis of a (tool name, payload) pair: risk level,
//! mutation class, signal tags, affected files, and a short diff preview.
//! The classifier never touches the filesystem; everything is derived from
//! the payload text, so two identical calls always classify identically.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::payload::ToolPayload;

/// Risk level of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    /// Read-only or otherwise non-mutating.
    Safe,
    /// Creates, modifies, or deletes state.
    Destructive,
}

/// Heuristic label for what kind of change a mutation represents.
///
/// Imprecise by design; used only for audit labeling, never for gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationClass {
    /// Structure-preserving rewrite (rename, reshuffle, extract).
    AstRefactor,
    /// The change advances the intent: new behavior, new surface.
    IntentEvolution,
    /// Not enough evidence to say.
    Unknown,
}

/// Confidence in the mutation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationConfidence {
    High,
    Medium,
    Low,
}

/// Full classification of one tool invocation.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Tool name after alias normalization.
    pub normalized_name: String,
    pub risk: Risk,
    pub mutation_class: MutationClass,
    pub confidence: MutationConfidence,
    /// Ordered signal tags explaining the mutation-class decision.
    pub signals: Vec<String>,
    /// Affected file paths, POSIX-normalized, first-seen order, de-duplicated.
    pub affected_files: Vec<String>,
    /// First 20 lines of the diff/patch text, if the payload carried one.
    pub diff_preview: Option<String>,
}

/// Tool names that are safe regardless of payload.
const SAFE_TOOLS: &[&str] = &[
    "read_file",
    "stat",
    "list",
    "list_files",
    "read_command_output",
];

/// Tool names that mutate state.
const DESTRUCTIVE_TOOLS: &[&str] = &[
    "write_to_file",
    "delete",
    "execute_command",
    "apply_diff",
    "apply_patch",
    "edit",
    "search_and_replace",
    "search_replace",
    "edit_file",
];

/// The subset of destructive tools whose payloads name the files they touch,
/// and which the scope & lock gate therefore authorizes per-path.
/// `execute_command` and `delete` are excluded: they are gated by the
/// human-in-the-loop hook instead.
const SCOPE_GATED_TOOLS: &[&str] = &[
    "write_to_file",
    "apply_diff",
    "apply_patch",
    "edit",
    "search_and_replace",
    "search_replace",
    "edit_file",
];

/// Phrases in added diff text that suggest the change evolves the intent
/// rather than reshuffling existing structure.
const EVOLUTION_PHRASES: &[&str] = &[
    "new feature",
    "add endpoint",
    "introduce",
    "support ",
    "migration",
    "breaking",
    "deprecate",
];

/// Conservative keyword shapes that indicate a structural (declaration-level)
/// line in most mainstream languages.
static STRUCTURAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(class|interface|type|enum|function|def|public|private|protected|module|namespace)\b|\bexport\s+(class|interface|type|enum|function|const)\b",
    )
    .expect("structural line regex")
});

/// Normalize a raw tool name to its canonical form.
pub fn normalize_tool_name(name: &str) -> &str {
    match name {
        "write_file" => "write_to_file",
        "exec_bash" => "execute_command",
        other => other,
    }
}

/// Whether a normalized tool name is in the scope-gated mutating set.
pub fn is_scope_gated(normalized: &str) -> bool {
    SCOPE_GATED_TOOLS.contains(&normalized)
}

/// Classify one tool invocation.
pub fn classify(tool_name: &str, payload: &ToolPayload) -> Classification {
    let normalized = normalize_tool_name(tool_name);
    let risk = classify_risk(normalized);
    let affected_files = extract_affected_files(normalized, payload);
    let diff_preview = payload
        .diff_text()
        .map(|d| d.lines().take(20).collect::<Vec<_>>().join("\n"));

    let (mutation_class, confidence, signals) = if risk == Risk::Destructive {
        classify_mutation(normalized, payload)
    } else {
        (MutationClass::Unknown, MutationConfidence::Low, Vec::new())
    };

    Classification {
        normalized_name: normalized.to_string(),
        risk,
        mutation_class,
        confidence,
        signals,
        affected_files,
        diff_preview,
    }
}

fn classify_risk(normalized: &str) -> Risk {
    if SAFE_TOOLS.contains(&normalized) {
        return Risk::Safe;
    }
    if DESTRUCTIVE_TOOLS.contains(&normalized) {
        return Risk::Destructive;
    }
    if normalized.starts_with("read_") || normalized.starts_with("list") {
        return Risk::Safe;
    }
    if normalized.starts_with("write") || normalized.starts_with("delete") {
        return Risk::Destructive;
    }
    // Unknown tools default safe; the gates only fire on destructive calls.
    Risk::Safe
}

/// Collect affected file paths from the payload.
///
/// Sources: the `path` and `file_path` keys, plus `*** Add/Update/Delete
/// File:` markers inside `apply_patch` envelopes. First-seen order is kept.
fn extract_affected_files(normalized: &str, payload: &ToolPayload) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        let normalized_path = posix_normalize(candidate);
        if !normalized_path.is_empty() && !files.contains(&normalized_path) {
            files.push(normalized_path);
        }
    };

    for key in ["path", "file_path"] {
        if let Some(p) = payload.trimmed_str(key) {
            push(p);
        }
    }

    if normalized == "apply_patch"
        && let Some(patch) = payload.diff_text()
    {
        for line in patch.lines() {
            for marker in [
                "*** Add File: ",
                "*** Update File: ",
                "*** Delete File: ",
            ] {
                if let Some(rest) = line.strip_prefix(marker) {
                    let p = rest.trim();
                    if !p.is_empty() {
                        push(p);
                    }
                }
            }
        }
    }

    files
}

/// Normalize a path string to forward slashes and strip a leading `./`.
fn posix_normalize(path: &str) -> String {
    let p = path.trim().replace('\\', "/");
    p.strip_prefix("./").unwrap_or(&p).to_string()
}

fn classify_mutation(
    normalized: &str,
    payload: &ToolPayload,
) -> (MutationClass, MutationConfidence, Vec<String>) {
    let Some(diff) = payload.diff_text() else {
        if normalized == "write_to_file" {
            return (
                MutationClass::IntentEvolution,
                MutationConfidence::Low,
                vec!["full_write_without_diff".to_string()],
            );
        }
        return (MutationClass::Unknown, MutationConfidence::Low, Vec::new());
    };

    let mut added: Vec<&str> = Vec::new();
    let mut removed: Vec<&str> = Vec::new();
    for line in diff.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            added.push(&line[1..]);
        } else if line.starts_with('-') && !line.starts_with("---") {
            removed.push(&line[1..]);
        }
    }

    let structural_added = added
        .iter()
        .filter(|l| STRUCTURAL_LINE.is_match(l))
        .count();
    let structural_removed = removed
        .iter()
        .filter(|l| STRUCTURAL_LINE.is_match(l))
        .count();

    let add_remove_balanced = !added.is_empty()
        && !removed.is_empty()
        && added.len().abs_diff(removed.len()) <= 10;

    let structural_max = structural_added.max(structural_removed);
    let structural_balanced = structural_added > 0
        && structural_removed > 0
        && structural_added.abs_diff(structural_removed)
            <= 2.max((structural_max as f64 * 0.4).ceil() as usize);

    let added_text = added.join("\n").to_lowercase();
    let evolution_language = EVOLUTION_PHRASES.iter().any(|p| added_text.contains(p));

    let adds_file = has_file_creation_marker(diff);
    let deletes_file = has_file_deletion_marker(diff);

    let mut signals = Vec::new();
    if add_remove_balanced {
        signals.push("balanced_diff_shape".to_string());
    }
    if structural_balanced {
        signals.push("balanced_structural_lines".to_string());
    }
    if evolution_language {
        signals.push("intent_evolution_language".to_string());
    }
    if adds_file {
        signals.push("adds_new_file".to_string());
    }
    if deletes_file {
        signals.push("deletes_file".to_string());
    }

    if add_remove_balanced && structural_balanced {
        let confidence = if evolution_language {
            MutationConfidence::Medium
        } else {
            MutationConfidence::High
        };
        (MutationClass::AstRefactor, confidence, signals)
    } else {
        let confidence = if evolution_language {
            MutationConfidence::High
        } else {
            MutationConfidence::Medium
        };
        (MutationClass::IntentEvolution, confidence, signals)
    }
}

fn has_file_creation_marker(diff: &str) -> bool {
    diff.lines().any(|l| {
        l.starts_with("*** Add File: ") || l.starts_with("--- /dev/null")
    })
}

fn has_file_deletion_marker(diff: &str) -> bool {
    diff.lines().any(|l| {
        l.starts_with("*** Delete File: ") || l.starts_with("+++ /dev/null")
    })
}
