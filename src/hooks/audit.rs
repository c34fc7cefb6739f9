//! Structured audit logging for every completed invocation.

use async_trait::async_trait;

use crate::engine::{CompletedInvocation, InvocationContext, PostToolHook};
use crate::error::HookError;

/// Post-hook emitting one `tracing` event per invocation. Purely
/// observational; always succeeds.
pub struct AuditHook;

#[async_trait]
impl PostToolHook for AuditHook {
    fn name(&self) -> &str {
        "audit_log"
    }

    async fn after(
        &self,
        ctx: &InvocationContext,
        outcome: &CompletedInvocation,
    ) -> Result<(), HookError> {
        let cls = &ctx.classification;
        tracing::info!(
            invocation = %ctx.invocation_id,
            tool = %ctx.tool_name,
            normalized = %cls.normalized_name,
            risk = ?cls.risk,
            mutation_class = ?cls.mutation_class,
            allowed = outcome.allowed,
            errored = outcome.error.is_some(),
            affected_files = cls.affected_files.len(),
            "invocation audited"
        );
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

    #[tokio::test]
    async fn audit_never_fails() {
        let payload = ToolPayload::new(serde_json::json!({"path": "src/a.ts"}));
        let ctx = InvocationContext {
            invocation_id: uuid::Uuid::new_v4(),
            tool_name: "write_to_file".to_string(),
            classification: classifier::classify("write_to_file", &payload),
            payload,
            started_at: chrono::Utc::now(),
            session: Arc::new(Session::new("/work")),
            capabilities: Capabilities {
                approval: Arc::new(StaticApprovalGate::new(ApprovalDecision::Reject)),
                results: Arc::new(NullSink),
                errors: Arc::new(TracingErrorSink),
            },
        };
        for outcome in [
            CompletedInvocation {
                allowed: true,
                denial_reason: None,
                result: Some(serde_json::json!("ok")),
                error: None,
            },
            CompletedInvocation {
                allowed: false,
                denial_reason: Some("scope".to_string()),
                result: None,
                error: None,
            },
            CompletedInvocation {
                allowed: true,
                denial_reason: None,
                result: None,
                error: Some("disk full".to_string()),
            },
        ] {
            assert!(AuditHook.after(&ctx, &outcome).await.is_ok());
        }
    }
}
