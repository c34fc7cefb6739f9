//! Scope authorization and optimistic locking for file-mutating tools.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::classifier;
use crate::diffing;
use crate::engine::{
    ApprovalRequest, HookDecision, HookFailureMode, InvocationContext, PreToolHook,
    ask_with_timeout,
};
use crate::error::HookError;
use crate::hashing;
use crate::intent::IntentStore;
use crate::scope::{self, ScopeExpansions};
use crate::tool_error::{ToolErrorBody, ToolErrorCode};

/// Pre-hook enforcing the active intent's owned scope and the
/// `observed_content_hash` optimistic lock.
///
/// Applies only to the scope-gated mutating set; `execute_command` and
/// `delete` are handled by the approval hook, and sessions without a working
/// directory, intent, or affected files pass through (the intent gate owns
/// the missing-intent denial).
pub struct ScopeLockGate {
    store: Arc<IntentStore>,
    expansions: Arc<ScopeExpansions>,
    orchestration_dir: String,
    approval_timeout: Duration,
}

impl ScopeLockGate {
    pub fn new(
        store: Arc<IntentStore>,
        expansions: Arc<ScopeExpansions>,
        orchestration_dir: impl Into<String>,
        approval_timeout: Duration,
    ) -> Self {
        Self {
            store,
            expansions,
            orchestration_dir: orchestration_dir.into(),
            approval_timeout,
        }
    }

    fn scope_violation(&self, rel: &str, declared: &[String]) -> ToolErrorBody {
        ToolErrorBody::tool_error(
            ToolErrorCode::ScopeViolation,
            format!("{rel} is outside the active intent's owned scope"),
        )
        .with_meta(serde_json::json!({
            "file_path": rel,
            "owned_scope": declared,
            "request_scope_expansion": {
                "additional_globs": ["<glob covering the file>"],
                "reason": "<why this intent needs the file>",
            },
        }))
    }
}

#[async_trait]
impl PreToolHook for ScopeLockGate {
    fn name(&self) -> &str {
        "scope_lock_gate"
    }

    fn failure_mode(&self) -> HookFailureMode {
        HookFailureMode::FailClosed
    }

    async fn before(&self, ctx: &InvocationContext) -> Result<HookDecision, HookError> {
        let cls = &ctx.classification;
        if !classifier::is_scope_gated(&cls.normalized_name) {
            return Ok(HookDecision::allow());
        }
        let Some(cwd) = ctx.session.cwd().cloned() else {
            return Ok(HookDecision::allow());
        };
        let Some(intent_id) = ctx.session.active_intent() else {
            return Ok(HookDecision::allow());
        };
        if cls.affected_files.is_empty() {
            return Ok(HookDecision::allow());
        }

        // ── scope check ──
        let intents = self.store.load(&cwd, &self.orchestration_dir).await;
        let declared: Vec<String> = intents
            .iter()
            .find(|i| i.id == intent_id)
            .map(|i| i.owned_scope.clone())
            .unwrap_or_default();
        let mut effective = declared.clone();
        effective.extend(self.expansions.for_intent(&intent_id));

        for file in &cls.affected_files {
            let rel = scope::relative_posix(&cwd, file);
            if scope::matches_any(&effective, &rel) {
                continue;
            }

            if let Some(request) = ctx.payload.scope_expansion_request()
                && !request.additional_globs.is_empty()
            {
                let summary = format!(
                    "Intent {intent_id} requests scope expansion to reach {rel}: add {}{}",
                    request.additional_globs.join(", "),
                    request
                        .reason
                        .as_deref()
                        .map(|r| format!(" ({r})"))
                        .unwrap_or_default()
                );
                let approval = ApprovalRequest {
                    tool_name: cls.normalized_name.clone(),
                    summary,
                };
                let decision = ask_with_timeout(
                    &ctx.capabilities.approval,
                    &approval,
                    self.approval_timeout,
                )
                .await;
                if decision.is_approved() {
                    self.expansions.approve(&intent_id, &request.additional_globs);
                    effective.extend(request.additional_globs.iter().cloned());
                    tracing::info!(
                        intent = %intent_id,
                        globs = ?request.additional_globs,
                        "scope expansion approved"
                    );
                    // Treated as matched for this and subsequent files.
                    continue;
                }
            }

            ctx.capabilities
                .results
                .push(self.scope_violation(&rel, &declared).to_json());
            return Ok(HookDecision::deny_reported(format!(
                "scope violation: {rel} is outside the owned scope of {intent_id}"
            )));
        }

        // ── optimistic lock ──
        if let Some(observed) = ctx.payload.observed_content_hash() {
            for file in &cls.affected_files {
                let rel = scope::relative_posix(&cwd, file);
                let abs = cwd.join(&rel);
                // Nonexistent or unreadable files have nothing to be stale
                // against.
                let Ok(current) = tokio::fs::read_to_string(&abs).await else {
                    continue;
                };
                let current_hash = hashing::hash_region(&rel, &current, None, None);
                if current_hash.digest != observed {
                    let current_diff = ctx
                        .payload
                        .content()
                        .map(|proposed| diffing::unified_preview(&current, proposed, 2, 80))
                        .unwrap_or_default();
                    let body = ToolErrorBody::tool_error(
                        ToolErrorCode::StaleFile,
                        format!("{rel} changed since it was last observed"),
                    )
                    .with_meta(serde_json::json!({
                        "file_path": rel,
                        "observed_content_hash": observed,
                        "current_content_hash": current_hash.digest,
                        "current_diff": current_diff,
                    }));
                    ctx.capabilities.results.push(body.to_json());
                    return Ok(HookDecision::deny_reported(format!(
                        "stale file: {rel} no longer matches the observed content hash"
                    )));
                }
            }
        }

        Ok(HookDecision::allow())
    }
}
