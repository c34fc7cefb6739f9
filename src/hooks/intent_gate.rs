//! Handshake enforcement: no mutation without a bound intent.

use async_trait::async_trait;

use crate::classifier::Risk;
use crate::engine::{HookDecision, HookFailureMode, InvocationContext, PreToolHook};
use crate::error::HookError;
use crate::tool_error::{ToolErrorBody, ToolErrorCode};

/// Pre-hook denying every destructive tool while the session has no active
/// intent. Safe tools pass through untouched.
pub struct IntentGate;

#[async_trait]
impl PreToolHook for IntentGate {
    fn name(&self) -> &str {
        "intent_gate"
    }

    fn failure_mode(&self) -> HookFailureMode {
        HookFailureMode::FailClosed
    }

    async fn before(&self, ctx: &InvocationContext) -> Result<HookDecision, HookError> {
        if ctx.classification.risk != Risk::Destructive {
            return Ok(HookDecision::allow());
        }
        if ctx.session.active_intent().is_some() {
            return Ok(HookDecision::allow());
        }

        let message = format!(
            "{} requires an active intent; select one with the intent handshake first",
            ctx.classification.normalized_name
        );
        let body = ToolErrorBody::tool_error(ToolErrorCode::NoActiveIntent, &message).with_meta(
            serde_json::json!({
                "tool": ctx.classification.normalized_name,
            }),
        );
        ctx.capabilities.results.push(body.to_json());
        Ok(HookDecision::deny_reported(message))
    }
}
