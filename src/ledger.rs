//! Trace ledger records and the append-only JSONL writer.
//!
//! One line per mutating invocation. Field order is fixed by struct
//! declaration order so that parsing a line and re-serializing it is
//! byte-stable.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::classifier::{MutationClass, MutationConfidence};
use crate::error::LedgerError;

/// One audit-log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Invocation id of the call that produced this record.
    pub id: String,
    /// RFC3339 wall-clock timestamp.
    pub timestamp: String,
    pub vcs: VcsInfo,
    pub files: Vec<FileTrace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsInfo {
    /// Git HEAD at record time, or `UNKNOWN`.
    pub revision_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTrace {
    pub relative_path: String,
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub url: String,
    pub contributor: Contributor,
    pub ranges: Vec<TraceRange>,
    pub related: Vec<RelatedLink>,
    pub meta: ConversationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    pub entity_type: String,
    pub model_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub agent_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub supervisor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRange {
    pub start_line: usize,
    pub end_line: usize,
    pub content_hash: String,
}

/// A reference binding the mutation to an external artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedLink {
    #[serde(rename = "type")]
    pub link_type: String,
    pub value: String,
}

impl RelatedLink {
    pub fn new(link_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub mutation_class: MutationClass,
    pub mutation_confidence: MutationConfidence,
    pub mutation_signals: Vec<String>,
    pub hook_invocation_id: String,
}

/// Serializes appends so concurrent invocations in one process cannot
/// interleave partial lines.
static APPEND_LOCK: Mutex<()> = Mutex::new(());

/// Append one record as a single JSON line, creating the parent directory if
/// needed.
pub fn append_record(path: &Path, record: &TraceRecord) -> Result<(), LedgerError> {
    let line = serde_json::to_string(record)?;
    debug_assert!(!line.contains('\n'));

    let _guard = APPEND_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LedgerError::Append {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LedgerError::Append {
            path: path.to_path_buf(),
            source,
        })?;
    writeln!(file, "{line}").map_err(|source| LedgerError::Append {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), id = %record.id, "trace record appended");
    Ok(())
}

/// The ledger path for a working directory.
pub fn ledger_path(cwd: &Path, orchestration_dir: &str) -> PathBuf {
    cwd.join(orchestration_dir).join("agent_trace.jsonl")
}

/// Current git HEAD of `cwd`, or `None` when unavailable.
pub async fn git_head(cwd: &Path) -> Option<String> {
    let output = tokio::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(cwd)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let head = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if head.is_empty() { None } else { Some(head) }
}
