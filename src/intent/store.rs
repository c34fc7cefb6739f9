//! Active-intent definitions loaded from `.orchestration/active_intents.yaml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;

/// A named unit of work authorizing a set of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub id: String,
    /// Glob patterns this intent may mutate, in declaration order.
    pub owned_scope: Vec<String>,
    pub constraints: Vec<String>,
    pub acceptance_criteria: Vec<String>,
}

struct CacheEntry {
    mtime: SystemTime,
    intents: Arc<Vec<Intent>>,
}

/// Loader for intent definition files, cached by (path, mtime).
///
/// Unreadable or unparseable files are treated as absence: the loader
/// returns an empty set and the caller's policy decides what that means.
#[derive(Default)]
pub struct IntentStore {
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl IntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the active intents for a working directory.
    ///
    /// Looks for `<cwd>/<dir>/active_intents.yaml`, then `.yml`.
    pub async fn load(&self, cwd: &Path, orchestration_dir: &str) -> Arc<Vec<Intent>> {
        let base = cwd.join(orchestration_dir);
        let mut path = base.join("active_intents.yaml");
        let mut meta = tokio::fs::metadata(&path).await;
        if meta.is_err() {
            path = base.join("active_intents.yml");
            meta = tokio::fs::metadata(&path).await;
        }
        let Ok(meta) = meta else {
            return Arc::new(Vec::new());
        };
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get(&path)
            && entry.mtime == mtime
        {
            return Arc::clone(&entry.intents);
        }

        let intents = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Arc::new(parse_intents(&path, &raw)),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read intent file: {}", e);
                Arc::new(Vec::new())
            }
        };
        cache.insert(
            path,
            CacheEntry {
                mtime,
                intents: Arc::clone(&intents),
            },
        );
        intents
    }

    /// Find one intent by id.
    pub async fn find(&self, cwd: &Path, orchestration_dir: &str, id: &str) -> Option<Intent> {
        self.load(cwd, orchestration_dir)
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }
}

fn parse_intents(path: &Path, raw: &str) -> Vec<Intent> {
    let doc: serde_yaml::Value = match serde_yaml::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(path = %path.display(), "unparseable intent file, treating as empty: {}", e);
            return Vec::new();
        }
    };

    let Some(entries) = doc.get("active_intents").and_then(|v| v.as_sequence()) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let Some(id) = entry.get("id").and_then(|v| v.as_str()) else {
                tracing::warn!(path = %path.display(), "intent entry without id, skipping");
                return None;
            };
            Some(Intent {
                id: id.to_string(),
                owned_scope: string_seq(entry.get("owned_scope")),
                constraints: string_seq(entry.get("constraints")),
                acceptance_criteria: string_seq(entry.get("acceptance_criteria")),
            })
        })
        .collect()
}

/// A YAML sequence of strings; anything else (missing, scalar, mapping)
/// collapses to empty.
fn string_seq(value: Option<&serde_yaml::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
