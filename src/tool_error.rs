//! Wire-shape error payloads pushed back to the agent.
//!
//! Policy denials and hook warnings travel as single JSON objects through the
//! push-result channel, never as thrown errors.

use serde::{Deserialize, Serialize};

/// Machine-readable denial/warning codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorCode {
    NoActiveIntent,
    ScopeViolation,
    StaleFile,
    HitlReject,
    HookInternalError,
}

/// The JSON body of a tool error or hook warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolErrorBody {
    /// `tool_error` for denials, `hook_warning` for post-hook failures.
    #[serde(rename = "type")]
    pub kind: String,
    pub code: ToolErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    pub meta: serde_json::Value,
}

impl ToolErrorBody {
    /// A pre-execution denial.
    pub fn tool_error(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: "tool_error".to_string(),
            code,
            message: message.into(),
            meta: serde_json::Value::Null,
        }
    }

    /// A post-execution warning; the tool already ran.
    pub fn hook_warning(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: "hook_warning".to_string(),
            code,
            message: message.into(),
            meta: serde_json::Value::Null,
        }
    }

    /// Attach structured metadata.
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    /// Serialize to the single-line JSON string pushed to the agent.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("failed to serialize tool error body: {}", e);
            format!(
                "{{\"type\":\"tool_error\",\"code\":\"HOOK_INTERNAL_ERROR\",\"message\":\"{}\"}}",
                "serialization failure"
            )
        })
    }
}
