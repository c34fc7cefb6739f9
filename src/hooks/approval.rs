//! Human-in-the-loop gate for destructive tools without per-path scoping.

use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{
    ApprovalRequest, HookDecision, HookFailureMode, InvocationContext, PreToolHook,
    ask_with_timeout,
};
use crate::error::HookError;
use crate::tool_error::{ToolErrorBody, ToolErrorCode};

/// Pre-hook that pauses configured tools (`execute_command`, `delete` by
/// default) for interactive approval. A rejection or an expired wait both
/// deny with `HITL_REJECT`.
pub struct HitlApprovalGate {
    gated_tools: Vec<String>,
    timeout: Duration,
}

impl HitlApprovalGate {
    pub fn new(gated_tools: Vec<String>, timeout: Duration) -> Self {
        Self {
            gated_tools,
            timeout,
        }
    }

    fn summary_for(&self, ctx: &InvocationContext) -> String {
        let cls = &ctx.classification;
        if let Some(command) = ctx.payload.command() {
            let preview: String = command.chars().take(200).collect();
            format!("{} wants to run: {preview}", cls.normalized_name)
        } else if !cls.affected_files.is_empty() {
            format!(
                "{} touches: {}",
                cls.normalized_name,
                cls.affected_files.join(", ")
            )
        } else {
            format!("{} requested", cls.normalized_name)
        }
    }
}

#[async_trait]
impl PreToolHook for HitlApprovalGate {
    fn name(&self) -> &str {
        "hitl_approval"
    }

    fn failure_mode(&self) -> HookFailureMode {
        HookFailureMode::FailClosed
    }

    async fn before(&self, ctx: &InvocationContext) -> Result<HookDecision, HookError> {
        let normalized = &ctx.classification.normalized_name;
        if !self.gated_tools.iter().any(|t| t == normalized) {
            return Ok(HookDecision::allow());
        }

        let request = ApprovalRequest {
            tool_name: normalized.clone(),
            summary: self.summary_for(ctx),
        };
        let decision =
            ask_with_timeout(&ctx.capabilities.approval, &request, self.timeout).await;
        if decision.is_approved() {
            tracing::info!(tool = %normalized, "operation approved");
            return Ok(HookDecision::allow());
        }

        let message = format!("{normalized} was not approved");
        let body = ToolErrorBody::tool_error(ToolErrorCode::HitlReject, &message).with_meta(
            serde_json::json!({
                "tool": normalized,
                "decision": match decision {
                    crate::engine::ApprovalDecision::Timeout => "timeout",
                    _ => "rejected",
                },
            }),
        );
        ctx.capabilities.results.push(body.to_json());
        Ok(HookDecision::deny_reported(message))
    }
}
