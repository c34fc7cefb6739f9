//! Configuration for Toolgate.

use std::time::Duration;

use crate::error::ConfigError;

/// Main configuration for the governance pipeline.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    /// Directory under the session cwd holding intent and ledger files.
    pub orchestration_dir: String,
    pub approval: ApprovalConfig,
    pub post_process: PostProcessConfig,
}

impl GovernanceConfig {
    /// Load configuration from environment variables.
    ///
    /// Every knob has a default; `from_env` only fails on malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            orchestration_dir: optional_env("TOOLGATE_ORCHESTRATION_DIR")?
                .unwrap_or_else(|| ".orchestration".to_string()),
            approval: ApprovalConfig::from_env()?,
            post_process: PostProcessConfig::from_env()?,
        })
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            orchestration_dir: ".orchestration".to_string(),
            approval: ApprovalConfig::default(),
            post_process: PostProcessConfig::default(),
        }
    }
}

/// Human-in-the-loop approval settings.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// Normalized tool names that always require interactive approval.
    pub gated_tools: Vec<String>,
    /// How long to wait for the approver before treating as a rejection.
    pub timeout: Duration,
}

impl ApprovalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let gated_tools = optional_env("TOOLGATE_APPROVAL_TOOLS")?
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(default_gated_tools);

        let timeout = optional_env("TOOLGATE_APPROVAL_TIMEOUT_SECS")?
            .map(|s| s.parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "TOOLGATE_APPROVAL_TIMEOUT_SECS".to_string(),
                message: format!("must be a positive integer: {e}"),
            })?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));

        Ok(Self {
            gated_tools,
            timeout,
        })
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            gated_tools: default_gated_tools(),
            timeout: Duration::from_secs(120),
        }
    }
}

fn default_gated_tools() -> Vec<String> {
    // The destructive tools the scope gate cannot authorize per-path.
    vec!["execute_command".to_string(), "delete".to_string()]
}

/// Post-mutation check commands (formatter, typechecker, test runner).
#[derive(Debug, Clone)]
pub struct PostProcessConfig {
    /// Shell commands run sequentially after successful mutations.
    /// Empty disables the post-process hook.
    pub commands: Vec<String>,
    /// Per-command timeout.
    pub timeout: Duration,
}

impl PostProcessConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let commands = optional_env("TOOLGATE_POST_PROCESS")?
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let timeout = optional_env("TOOLGATE_POST_PROCESS_TIMEOUT_SECS")?
            .map(|s| s.parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "TOOLGATE_POST_PROCESS_TIMEOUT_SECS".to_string(),
                message: format!("must be a positive integer: {e}"),
            })?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        Ok(Self { commands, timeout })
    }
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Read an environment variable, distinguishing absent from malformed.
fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: key.to_string(),
        }),
    }
}
