//! Dependency extraction from the `.orchestration/intent_map.md` document.
//!
//! The map is human-maintained Markdown. Per-intent sections start with
//! `## <ID>`; inside a section, a `**Depends on:**` marker introduces a
//! bulleted list of dependency ids that runs until the first blank line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;

use regex::Regex;
use tokio::sync::Mutex;

static SECTION_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+([A-Z]+-\d+)").expect("section heading regex"));

struct CacheEntry {
    mtime: SystemTime,
    dependencies: Arc<HashMap<String, Vec<String>>>,
}

/// Cached reader of the intent map.
#[derive(Default)]
pub struct IntentMap {
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl IntentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependency ids declared for `intent_id`, or empty when the map is
    /// missing, unreadable, or silent about this intent.
    pub async fn dependencies_of(
        &self,
        cwd: &Path,
        orchestration_dir: &str,
        intent_id: &str,
    ) -> Vec<String> {
        let path = cwd.join(orchestration_dir).join("intent_map.md");
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            return Vec::new();
        };
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get(&path)
            && entry.mtime == mtime
        {
            return entry
                .dependencies
                .get(intent_id)
                .cloned()
                .unwrap_or_default();
        }

        let dependencies = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Arc::new(parse_dependencies(&raw)),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read intent map: {}", e);
                Arc::new(HashMap::new())
            }
        };
        let result = dependencies.get(intent_id).cloned().unwrap_or_default();
        cache.insert(path, CacheEntry { mtime, dependencies });
        result
    }
}

fn parse_dependencies(raw: &str) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    let mut current_section: Option<String> = None;
    let mut in_depends_list = false;

    for line in raw.lines() {
        if let Some(caps) = SECTION_HEADING.captures(line) {
            current_section = Some(caps[1].to_string());
            in_depends_list = false;
            continue;
        }
        let Some(section) = &current_section else {
            continue;
        };

        if line.contains("**Depends on:**") {
            in_depends_list = true;
            continue;
        }
        if in_depends_list {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                in_depends_list = false;
            } else if let Some(rest) = trimmed.strip_prefix('-') {
                let dep = rest.trim().trim_matches('`').trim();
                if !dep.is_empty() {
                    out.entry(section.clone()).or_default().push(dep.to_string());
                }
            }
        }
    }

    out
}
