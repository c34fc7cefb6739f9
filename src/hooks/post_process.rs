//! Post-mutation checks: formatter, typechecker, tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::classifier::Risk;
use crate::engine::{CompletedInvocation, InvocationContext, PostToolHook};
use crate::error::HookError;

/// Post-hook running configured shell commands after successful mutations.
///
/// Failures are reported to the session's user-message sink so the agent can
/// react next turn; they never change the invocation outcome. An empty
/// command list disables the hook.
pub struct PostProcessHook {
    commands: Vec<String>,
    timeout: Duration,
}

impl PostProcessHook {
    pub fn new(commands: Vec<String>, timeout: Duration) -> Self {
        Self { commands, timeout }
    }
}

#[async_trait]
impl PostToolHook for PostProcessHook {
    fn name(&self) -> &str {
        "post_process"
    }

    async fn after(
        &self,
        ctx: &InvocationContext,
        outcome: &CompletedInvocation,
    ) -> Result<(), HookError> {
        let cls = &ctx.classification;
        if self.commands.is_empty()
            || !outcome.allowed
            || outcome.error.is_some()
            || cls.risk != Risk::Destructive
            || cls.affected_files.is_empty()
        {
            return Ok(());
        }
        let Some(cwd) = ctx.session.cwd().cloned() else {
            return Ok(());
        };

        for command in &self.commands {
            let spawned = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&cwd)
                .output();
            match tokio::time::timeout(self.timeout, spawned).await {
                Ok(Ok(output)) if output.status.success() => {
                    tracing::info!(command, "post-process check passed");
                }
                Ok(Ok(output)) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let excerpt: String = stderr.chars().take(800).collect();
                    tracing::warn!(command, status = ?output.status.code(), "post-process check failed");
                    ctx.session.push_message(format!(
                        "Post-process check `{command}` failed:\n{excerpt}"
                    ));
                }
                Ok(Err(e)) => {
                    tracing::warn!(command, "post-process spawn failed: {}", e);
                    ctx.session.push_message(format!(
                        "Post-process check `{command}` could not run: {e}"
                    ));
                }
                Err(_) => {
                    tracing::warn!(command, timeout = ?self.timeout, "post-process check timed out");
                    ctx.session.push_message(format!(
                        "Post-process check `{command}` timed out after {:?}",
                        self.timeout
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::classifier;
    use crate::engine::{
        ApprovalDecision, Capabilities, ResultSink, StaticApprovalGate, TracingErrorSink,
    };
    use crate::payload::ToolPayload;
    use crate::session::Session;

    struct NullSink;
    impl ResultSink for NullSink {
        fn push(&self, _payload: String) {}
    }

    fn ctx_for(tool: &str, session: Arc<Session>) -> InvocationContext {
        let payload = ToolPayload::new(serde_json::json!({"path": "src/a.ts"}));
        InvocationContext {
            invocation_id: uuid::Uuid::new_v4(),
            tool_name: tool.to_string(),
            classification: classifier::classify(tool, &payload),
            payload,
            started_at: chrono::Utc::now(),
            session,
            capabilities: Capabilities {
                approval: Arc::new(StaticApprovalGate::new(ApprovalDecision::Reject)),
                results: Arc::new(NullSink),
                errors: Arc::new(TracingErrorSink),
            },
        }
    }

    fn success() -> CompletedInvocation {
        CompletedInvocation {
            allowed: true,
            denial_reason: None,
            result: Some(serde_json::Value::Null),
            error: None,
        }
    }

    #[tokio::test]
    async fn failing_command_reports_to_session_sink() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = Arc::new(Session::new(tmp.path()));
        let hook = PostProcessHook::new(
            vec!["echo checking >&2; exit 3".to_string()],
            Duration::from_secs(10),
        );

        hook.after(&ctx_for("write_to_file", Arc::clone(&session)), &success())
            .await
            .expect("hook never errors");

        let messages = session.drain_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("failed"));
        assert!(messages[0].contains("checking"));
    }

    #[tokio::test]
    async fn passing_command_is_silent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = Arc::new(Session::new(tmp.path()));
        let hook = PostProcessHook::new(vec!["true".to_string()], Duration::from_secs(10));

        hook.after(&ctx_for("write_to_file", Arc::clone(&session)), &success())
            .await
            .expect("ok");
        assert!(session.drain_messages().is_empty());
    }

    #[tokio::test]
    async fn skips_safe_denied_and_unconfigured() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = Arc::new(Session::new(tmp.path()));

        // No commands configured: nothing runs even for mutations.
        let disabled = PostProcessHook::new(Vec::new(), Duration::from_secs(1));
        disabled
            .after(&ctx_for("write_to_file", Arc::clone(&session)), &success())
            .await
            .expect("ok");

        // Safe tool: skipped.
        let hook = PostProcessHook::new(vec!["exit 1".to_string()], Duration::from_secs(1));
        hook.after(&ctx_for("read_file", Arc::clone(&session)), &success())
            .await
            .expect("ok");

        // Denied outcome: skipped.
        let denied = CompletedInvocation {
            allowed: false,
            denial_reason: Some("scope".to_string()),
            result: None,
            error: None,
        };
        hook.after(&ctx_for("write_to_file", Arc::clone(&session)), &denied)
            .await
            .expect("ok");

        assert!(session.drain_messages().is_empty());
    }
}
