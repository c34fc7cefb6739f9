//! Abstract capabilities the surrounding environment hands to the engine.
//!
//! The engine never talks to a UI or a transport directly: approvals, result
//! pushes, and hook-error reporting all go through these seams.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::HookError;
use crate::session::Session;

/// A human-in-the-loop approval request.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tool_name: String,
    /// Human-readable summary of what is being approved.
    pub summary: String,
}

/// Outcome of an approval request. `Timeout` is treated as `Reject`
/// everywhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
    Timeout,
}

impl ApprovalDecision {
    pub fn is_approved(self) -> bool {
        matches!(self, ApprovalDecision::Approve)
    }
}

/// Ask a human (or a policy proxy) to approve an operation.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn ask(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Push a text payload back to the agent for its next turn.
pub trait ResultSink: Send + Sync {
    fn push(&self, payload: String);
}

/// Report a contained hook failure to the host.
pub trait ErrorSink: Send + Sync {
    fn hook_failed(&self, hook: &str, error: &HookError);
}

/// The capability bundle threaded through every invocation.
#[derive(Clone)]
pub struct Capabilities {
    pub approval: Arc<dyn ApprovalGate>,
    pub results: Arc<dyn ResultSink>,
    pub errors: Arc<dyn ErrorSink>,
}

/// Ask for approval with an upper bound on the wait; an elapsed deadline is
/// a `Timeout` decision, not an error.
pub async fn ask_with_timeout(
    gate: &Arc<dyn ApprovalGate>,
    request: &ApprovalRequest,
    timeout: Duration,
) -> ApprovalDecision {
    match tokio::time::timeout(timeout, gate.ask(request)).await {
        Ok(decision) => decision,
        Err(_) => {
            tracing::warn!(tool = %request.tool_name, "approval request timed out");
            ApprovalDecision::Timeout
        }
    }
}

/// Result sink that appends to the session's user-message sink.
pub struct SessionResultSink {
    session: Arc<Session>,
}

impl SessionResultSink {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

impl ResultSink for SessionResultSink {
    fn push(&self, payload: String) {
        self.session.push_message(payload);
    }
}

/// Approval gate that always answers with a fixed decision.
///
/// Useful for autonomous deployments (always reject interactive asks) and
/// for tests.
pub struct StaticApprovalGate {
    decision: ApprovalDecision,
}

impl StaticApprovalGate {
    pub fn new(decision: ApprovalDecision) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl ApprovalGate for StaticApprovalGate {
    async fn ask(&self, request: &ApprovalRequest) -> ApprovalDecision {
        tracing::debug!(
            tool = %request.tool_name,
            decision = ?self.decision,
            "static approval gate answered"
        );
        self.decision
    }
}

/// Error sink that logs through `tracing`.
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn hook_failed(&self, hook: &str, error: &HookError) {
        tracing::warn!(hook, "hook failed: {}", error);
    }
}
