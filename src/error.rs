//! Error types for Toolgate.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for the governance pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Intent error: {0}")]
    Intent(#[from] IntentError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Tool runtime error: {0}")]
    Tool(#[from] ToolRuntimeError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration value for {key} is not valid unicode")]
    NotUnicode { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from loading or selecting intents.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("Intent not found: {id}")]
    NotFound { id: String },

    #[error("Invalid intent id: {id}")]
    InvalidId { id: String },

    #[error("Failed to parse intent file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Session has no working directory")]
    NoWorkingDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised inside pre- or post-hooks.
///
/// A pre-hook error never escapes the engine: fail-closed hooks convert to a
/// synthesized `HOOK_INTERNAL_ERROR` denial, fail-open hooks are reported and
/// skipped. Post-hook errors are reported and surfaced as hook warnings.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Hook {hook} failed: {reason}")]
    ExecutionFailed { hook: String, reason: String },

    #[error("Hook {hook} could not serialize its output: {reason}")]
    Serialization { hook: String, reason: String },

    #[error("IO error in hook {hook}: {source}")]
    Io {
        hook: String,
        #[source]
        source: std::io::Error,
    },
}

impl HookError {
    /// Convenience constructor for an execution failure.
    pub fn failed(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        HookError::ExecutionFailed {
            hook: hook.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the trace ledger writer.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to serialize trace record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to append to ledger {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced by the tool runtime closure handed to the engine.
///
/// The engine never synthesizes these; it only captures and re-throws them
/// after post-hooks have observed the outcome.
#[derive(Debug, thiserror::Error)]
pub enum ToolRuntimeError {
    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the governance pipeline.
pub type Result<T> = std::result::Result<T, Error>;
