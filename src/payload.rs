//! Opaque tool payloads with typed accessors.
//!
//! Payloads arrive from the agent as heterogeneous JSON. Rather than forcing
//! a closed schema, this wrapper keeps the raw value and exposes tolerant
//! getters for the fields the pipeline cares about; unknown keys are ignored
//! everywhere.

use serde::Deserialize;

/// A tool invocation payload.
#[derive(Debug, Clone, Default)]
pub struct ToolPayload(serde_json::Value);

/// A runtime request to widen the active intent's owned scope.
///
/// May arrive inline as an object or as a JSON-encoded string under the
/// `request_scope_expansion` key.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeExpansionRequest {
    /// Additional glob patterns the agent is asking to mutate.
    #[serde(default)]
    pub additional_globs: Vec<String>,
    /// Free-text justification shown to the approver.
    #[serde(default)]
    pub reason: Option<String>,
}

impl ToolPayload {
    /// Wrap a raw JSON payload.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The underlying JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }

    /// A string field, if present.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// A string field, trimmed, only if non-empty after trimming.
    pub fn trimmed_str(&self, key: &str) -> Option<&str> {
        self.str_field(key)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The diff or patch text carried by the payload, if any.
    ///
    /// Checked keys, in order: `diff`, `patch`.
    pub fn diff_text(&self) -> Option<&str> {
        self.str_field("diff").or_else(|| self.str_field("patch"))
    }

    /// The full proposed file content, if any.
    pub fn content(&self) -> Option<&str> {
        self.str_field("content")
    }

    /// The replacement string of an edit-style payload, if any.
    pub fn new_string(&self) -> Option<&str> {
        self.str_field("new_string")
    }

    /// The shell command of an exec-style payload, if any.
    pub fn command(&self) -> Option<&str> {
        self.str_field("command")
    }

    /// The client-observed content hash used for optimistic locking.
    pub fn observed_content_hash(&self) -> Option<&str> {
        self.trimmed_str("observed_content_hash")
    }

    /// The scope-expansion request, decoded from an inline object or a
    /// JSON-encoded string. Returns `None` on absence or malformed input.
    pub fn scope_expansion_request(&self) -> Option<ScopeExpansionRequest> {
        let value = self.0.get("request_scope_expansion")?;
        match value {
            serde_json::Value::Object(_) => {
                serde_json::from_value(value.clone()).ok()
            }
            serde_json::Value::String(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }

    /// A list-valued field that tolerates both JSON arrays of strings and
    /// comma-separated strings. Entries are trimmed; empties dropped.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(serde_json::Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<serde_json::Value> for ToolPayload {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}
