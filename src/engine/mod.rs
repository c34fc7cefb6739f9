//! The hook engine: ordered pre-check / execute / post-process pipeline.
//!
//! Every tool invocation flows through `HookEngine::execute`. Pre-hooks run
//! in registration order and may deny; the tool runtime closure runs exactly
//! once if all allow; post-hooks observe every outcome. Hook failures are
//! contained: a fail-closed hook failure becomes a synthesized
//! `HOOK_INTERNAL_ERROR` denial, a fail-open one is reported and skipped,
//! and a post-hook failure becomes a `hook_warning` — under no circumstance
//! does a hook error propagate out of the engine.

pub mod capabilities;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::classifier::{self, Classification};
use crate::error::{HookError, ToolRuntimeError};
use crate::payload::ToolPayload;
use crate::scope::ScopeExpansions;
use crate::session::Session;
use crate::tool_error::{ToolErrorBody, ToolErrorCode};

pub use capabilities::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, Capabilities, ErrorSink, ResultSink,
    SessionResultSink, StaticApprovalGate, TracingErrorSink, ask_with_timeout,
};

/// How the engine treats a hook's internal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFailureMode {
    /// Report and continue as if the hook allowed.
    FailOpen,
    /// Deny the invocation with a synthesized `HOOK_INTERNAL_ERROR`.
    FailClosed,
}

/// A pre-hook's verdict on one invocation.
#[derive(Debug, Clone)]
pub enum HookDecision {
    /// Continue to the next hook.
    Allow,
    /// Stop the chain and deny the invocation.
    Deny {
        reason: Option<String>,
        /// The hook already pushed its own payload to the agent; the engine
        /// must not push the reason a second time.
        already_reported: bool,
    },
}

impl HookDecision {
    pub fn allow() -> Self {
        HookDecision::Allow
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        HookDecision::Deny {
            reason: Some(reason.into()),
            already_reported: false,
        }
    }

    /// Deny after the hook has already pushed a full error payload.
    pub fn deny_reported(reason: impl Into<String>) -> Self {
        HookDecision::Deny {
            reason: Some(reason.into()),
            already_reported: true,
        }
    }
}

/// Everything a hook can see about the invocation in flight.
pub struct InvocationContext {
    pub invocation_id: Uuid,
    /// Tool name exactly as submitted.
    pub tool_name: String,
    pub payload: ToolPayload,
    /// Computed once at engine entry.
    pub classification: Classification,
    /// Wall-clock time of engine entry.
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub session: Arc<Session>,
    pub capabilities: Capabilities,
}

/// What post-hooks observe after the execute phase.
#[derive(Debug, Clone)]
pub struct CompletedInvocation {
    pub allowed: bool,
    pub denial_reason: Option<String>,
    /// The closure's return value, when it ran and succeeded.
    pub result: Option<serde_json::Value>,
    /// Rendered closure error, when it ran and failed.
    pub error: Option<String>,
}

/// A named pre-check. Runs before the tool; may deny.
#[async_trait]
pub trait PreToolHook: Send + Sync {
    /// Unique name; re-registration replaces by name.
    fn name(&self) -> &str;

    /// Default: fail-open.
    fn failure_mode(&self) -> HookFailureMode {
        HookFailureMode::FailOpen
    }

    async fn before(&self, ctx: &InvocationContext) -> Result<HookDecision, HookError>;
}

/// A named post-processor. Observes every outcome; never votes.
#[async_trait]
pub trait PostToolHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after(
        &self,
        ctx: &InvocationContext,
        outcome: &CompletedInvocation,
    ) -> Result<(), HookError>;
}

/// The tuple returned to the caller of `execute`.
#[derive(Debug)]
pub struct ExecuteOutcome {
    pub invocation_id: Uuid,
    pub allowed: bool,
    pub result: Option<serde_json::Value>,
    pub denial_reason: Option<String>,
}

/// Middleware kernel wrapping tool invocations.
pub struct HookEngine {
    pre: RwLock<Vec<Arc<dyn PreToolHook>>>,
    post: RwLock<Vec<Arc<dyn PostToolHook>>>,
    expansions: Arc<ScopeExpansions>,
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HookEngine {
    pub fn new() -> Self {
        Self {
            pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
            expansions: Arc::new(ScopeExpansions::new()),
        }
    }

    /// The runtime scope-expansion set owned by this engine.
    pub fn scope_expansions(&self) -> Arc<ScopeExpansions> {
        Arc::clone(&self.expansions)
    }

    /// Drop all approved scope expansions (test isolation).
    pub fn clear_scope_expansions(&self) {
        self.expansions.clear();
    }

    /// Register a pre-hook. First registered runs first; registering an
    /// existing name replaces the hook at its original position.
    pub async fn register_pre(&self, hook: Arc<dyn PreToolHook>) {
        let mut hooks = self.pre.write().await;
        if let Some(slot) = hooks.iter_mut().find(|h| h.name() == hook.name()) {
            *slot = hook;
        } else {
            hooks.push(hook);
        }
    }

    /// Register a post-hook with the same ordering semantics.
    pub async fn register_post(&self, hook: Arc<dyn PostToolHook>) {
        let mut hooks = self.post.write().await;
        if let Some(slot) = hooks.iter_mut().find(|h| h.name() == hook.name()) {
            *slot = hook;
        } else {
            hooks.push(hook);
        }
    }

    /// Run one tool invocation through the full pipeline.
    ///
    /// The closure runs exactly once, and only if every pre-hook allows. Its
    /// error, if any, is re-thrown after all post-hooks have observed the
    /// outcome.
    pub async fn execute<F, Fut>(
        &self,
        tool_name: &str,
        payload: serde_json::Value,
        session: Arc<Session>,
        capabilities: Capabilities,
        run: F,
    ) -> Result<ExecuteOutcome, ToolRuntimeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, ToolRuntimeError>>,
    {
        let invocation_id = Uuid::new_v4();
        let payload = ToolPayload::new(payload);
        let classification = classifier::classify(tool_name, &payload);
        tracing::debug!(
            invocation = %invocation_id,
            tool = tool_name,
            normalized = %classification.normalized_name,
            risk = ?classification.risk,
            "invocation entering pipeline"
        );

        let ctx = InvocationContext {
            invocation_id,
            tool_name: tool_name.to_string(),
            payload,
            classification,
            started_at: chrono::Utc::now(),
            session,
            capabilities: capabilities.clone(),
        };

        // ── pre-hook phase ──
        let pre_hooks: Vec<Arc<dyn PreToolHook>> = self.pre.read().await.clone();
        let mut allowed = true;
        let mut denial_reason: Option<String> = None;
        let mut reported = false;

        for hook in &pre_hooks {
            match hook.before(&ctx).await {
                Ok(HookDecision::Allow) => {}
                Ok(HookDecision::Deny {
                    reason,
                    already_reported,
                }) => {
                    tracing::info!(
                        invocation = %invocation_id,
                        hook = hook.name(),
                        reason = reason.as_deref().unwrap_or(""),
                        "invocation denied"
                    );
                    allowed = false;
                    denial_reason = reason;
                    reported = already_reported;
                    break;
                }
                Err(error) => match hook.failure_mode() {
                    HookFailureMode::FailClosed => {
                        let message = format!(
                            "hook {} failed internally: {}",
                            hook.name(),
                            error
                        );
                        tracing::error!(
                            invocation = %invocation_id,
                            hook = hook.name(),
                            "fail-closed hook error, denying: {}",
                            error
                        );
                        let body = ToolErrorBody::tool_error(
                            ToolErrorCode::HookInternalError,
                            &message,
                        )
                        .with_meta(serde_json::json!({"hook": hook.name()}));
                        capabilities.results.push(body.to_json());
                        allowed = false;
                        denial_reason = Some(message);
                        reported = true;
                        break;
                    }
                    HookFailureMode::FailOpen => {
                        capabilities.errors.hook_failed(hook.name(), &error);
                    }
                },
            }
        }

        // ── execute phase ──
        let mut result: Option<serde_json::Value> = None;
        let mut runtime_error: Option<ToolRuntimeError> = None;
        if allowed {
            match run().await {
                Ok(value) => result = Some(value),
                Err(error) => runtime_error = Some(error),
            }
        } else if let Some(reason) = &denial_reason
            && !reported
        {
            capabilities.results.push(reason.clone());
        }

        // ── post-hook phase: runs for every outcome ──
        let outcome = CompletedInvocation {
            allowed,
            denial_reason: denial_reason.clone(),
            result: result.clone(),
            error: runtime_error.as_ref().map(|e| e.to_string()),
        };
        let post_hooks: Vec<Arc<dyn PostToolHook>> = self.post.read().await.clone();
        for hook in &post_hooks {
            if let Err(error) = hook.after(&ctx, &outcome).await {
                capabilities.errors.hook_failed(hook.name(), &error);
                let body = ToolErrorBody::hook_warning(
                    ToolErrorCode::HookInternalError,
                    format!("post-hook {} failed: {}", hook.name(), error),
                )
                .with_meta(serde_json::json!({"hook": hook.name()}));
                capabilities.results.push(body.to_json());
            }
        }

        if let Some(error) = runtime_error {
            return Err(error);
        }
        Ok(ExecuteOutcome {
            invocation_id,
            allowed,
            result,
            denial_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink(Mutex<Vec<String>>);

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut self.0.lock().unwrap())
        }
    }

    impl ResultSink for RecordingSink {
        fn push(&self, payload: String) {
            self.0.lock().unwrap().push(payload);
        }
    }

    fn capabilities(sink: Arc<RecordingSink>) -> Capabilities {
        Capabilities {
            approval: Arc::new(StaticApprovalGate::new(ApprovalDecision::Approve)),
            results: sink,
            errors: Arc::new(TracingErrorSink),
        }
    }

    /// Pre-hook that records its name into a shared event log.
    struct TracingPre {
        name: String,
        events: Arc<Mutex<Vec<String>>>,
        decision: fn() -> Result<HookDecision, HookError>,
        mode: HookFailureMode,
    }

    #[async_trait]
    impl PreToolHook for TracingPre {
        fn name(&self) -> &str {
            &self.name
        }
        fn failure_mode(&self) -> HookFailureMode {
            self.mode
        }
        async fn before(&self, _ctx: &InvocationContext) -> Result<HookDecision, HookError> {
            self.events.lock().unwrap().push(self.name.clone());
            (self.decision)()
        }
    }

    struct TracingPost {
        name: String,
        events: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl PostToolHook for TracingPost {
        fn name(&self) -> &str {
            &self.name
        }
        async fn after(
            &self,
            _ctx: &InvocationContext,
            _outcome: &CompletedInvocation,
        ) -> Result<(), HookError> {
            self.events.lock().unwrap().push(self.name.clone());
            if self.fail {
                Err(HookError::failed(&self.name, "boom"))
            } else {
                Ok(())
            }
        }
    }

    fn pre(
        name: &str,
        events: &Arc<Mutex<Vec<String>>>,
        decision: fn() -> Result<HookDecision, HookError>,
    ) -> Arc<dyn PreToolHook> {
        Arc::new(TracingPre {
            name: name.to_string(),
            events: Arc::clone(events),
            decision,
            mode: HookFailureMode::FailOpen,
        })
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order_around_execute() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        engine.register_pre(pre("A", &events, || Ok(HookDecision::allow()))).await;
        engine.register_pre(pre("B", &events, || Ok(HookDecision::allow()))).await;
        engine
            .register_post(Arc::new(TracingPost {
                name: "C".to_string(),
                events: Arc::clone(&events),
                fail: false,
            }))
            .await;

        let sink = RecordingSink::new();
        let events_in_run = Arc::clone(&events);
        let outcome = engine
            .execute(
                "read_file",
                serde_json::json!({"path": "src/a.ts"}),
                Arc::new(Session::new("/work")),
                capabilities(Arc::clone(&sink)),
                move || async move {
                    events_in_run.lock().unwrap().push("execute".to_string());
                    Ok(serde_json::json!({"ok": true}))
                },
            )
            .await
            .expect("execute");

        assert!(outcome.allowed);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["A", "B", "execute", "C"],
            "ordering guarantee"
        );
        assert!(sink.take().is_empty());
    }

    #[tokio::test]
    async fn deny_stops_chain_and_skips_execute_but_not_post_hooks() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        engine
            .register_pre(pre("deny", &events, || Ok(HookDecision::deny("no"))))
            .await;
        engine.register_pre(pre("late", &events, || Ok(HookDecision::allow()))).await;
        engine
            .register_post(Arc::new(TracingPost {
                name: "post".to_string(),
                events: Arc::clone(&events),
                fail: false,
            }))
            .await;

        let sink = RecordingSink::new();
        let outcome = engine
            .execute(
                "write_to_file",
                serde_json::json!({"path": "src/a.ts"}),
                Arc::new(Session::new("/work")),
                capabilities(Arc::clone(&sink)),
                || async { panic!("execute must not run") },
            )
            .await
            .expect("execute");

        assert!(!outcome.allowed);
        assert_eq!(outcome.denial_reason.as_deref(), Some("no"));
        assert_eq!(*events.lock().unwrap(), vec!["deny", "post"]);
        // The textual reason was pushed exactly once.
        assert_eq!(sink.take(), vec!["no"]);
    }

    #[tokio::test]
    async fn already_reported_denial_is_not_pushed_again() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        engine
            .register_pre(pre("deny", &events, || {
                Ok(HookDecision::deny_reported("already told the agent"))
            }))
            .await;

        let sink = RecordingSink::new();
        engine
            .execute(
                "write_to_file",
                serde_json::json!({}),
                Arc::new(Session::new("/work")),
                capabilities(Arc::clone(&sink)),
                || async { Ok(serde_json::Value::Null) },
            )
            .await
            .expect("execute");

        assert!(sink.take().is_empty());
    }

    #[tokio::test]
    async fn fail_open_hook_error_is_contained_and_chain_continues() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        engine
            .register_pre(pre("broken", &events, || Err(HookError::failed("broken", "x"))))
            .await;
        engine.register_pre(pre("next", &events, || Ok(HookDecision::allow()))).await;

        let sink = RecordingSink::new();
        let outcome = engine
            .execute(
                "read_file",
                serde_json::json!({}),
                Arc::new(Session::new("/work")),
                capabilities(Arc::clone(&sink)),
                || async { Ok(serde_json::json!("ran")) },
            )
            .await
            .expect("execute");

        assert!(outcome.allowed);
        assert_eq!(*events.lock().unwrap(), vec!["broken", "next"]);
    }

    #[tokio::test]
    async fn fail_closed_hook_error_synthesizes_internal_error_denial() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        engine
            .register_pre(Arc::new(TracingPre {
                name: "critical".to_string(),
                events: Arc::clone(&events),
                decision: || Err(HookError::failed("critical", "cannot read scope")),
                mode: HookFailureMode::FailClosed,
            }))
            .await;

        let sink = RecordingSink::new();
        let outcome = engine
            .execute(
                "write_to_file",
                serde_json::json!({}),
                Arc::new(Session::new("/work")),
                capabilities(Arc::clone(&sink)),
                || async { panic!("execute must not run") },
            )
            .await
            .expect("execute");

        assert!(!outcome.allowed);
        let pushed = sink.take();
        assert_eq!(pushed.len(), 1, "exactly one synthesized error");
        assert!(pushed[0].contains("\"code\":\"HOOK_INTERNAL_ERROR\""));
        assert!(pushed[0].contains("\"type\":\"tool_error\""));
    }

    #[tokio::test]
    async fn post_hook_failure_becomes_hook_warning() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        engine
            .register_post(Arc::new(TracingPost {
                name: "flaky".to_string(),
                events: Arc::clone(&events),
                fail: true,
            }))
            .await;

        let sink = RecordingSink::new();
        let outcome = engine
            .execute(
                "read_file",
                serde_json::json!({}),
                Arc::new(Session::new("/work")),
                capabilities(Arc::clone(&sink)),
                || async { Ok(serde_json::json!("ran")) },
            )
            .await
            .expect("execute");

        // The tool already executed; its outcome stands.
        assert!(outcome.allowed);
        assert_eq!(outcome.result, Some(serde_json::json!("ran")));
        let pushed = sink.take();
        assert_eq!(pushed.len(), 1);
        assert!(pushed[0].contains("\"type\":\"hook_warning\""));
        assert!(pushed[0].contains("\"code\":\"HOOK_INTERNAL_ERROR\""));
    }

    #[tokio::test]
    async fn runtime_error_is_rethrown_after_post_hooks() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        engine
            .register_post(Arc::new(TracingPost {
                name: "observer".to_string(),
                events: Arc::clone(&events),
                fail: false,
            }))
            .await;

        let sink = RecordingSink::new();
        let result = engine
            .execute(
                "write_to_file",
                serde_json::json!({}),
                Arc::new(Session::new("/work")),
                capabilities(sink),
                || async {
                    Err(ToolRuntimeError::ExecutionFailed {
                        name: "write_to_file".to_string(),
                        reason: "disk full".to_string(),
                    })
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(ToolRuntimeError::ExecutionFailed { .. })
        ));
        // Post-hook still observed the errored invocation.
        assert_eq!(*events.lock().unwrap(), vec!["observer"]);
    }

    #[tokio::test]
    async fn re_registration_replaces_in_place() {
        let engine = HookEngine::new();
        let events: Arc<Mutex<Vec<String>>> = Arc::default();

        // k registered between a and b, then replaced: position must hold.
        engine.register_pre(pre("a", &events, || Ok(HookDecision::allow()))).await;
        engine
            .register_pre(pre("k", &events, || Ok(HookDecision::deny("old k"))))
            .await;
        engine.register_pre(pre("b", &events, || Ok(HookDecision::allow()))).await;
        engine.register_pre(pre("k", &events, || Ok(HookDecision::allow()))).await;

        let sink = RecordingSink::new();
        let outcome = engine
            .execute(
                "read_file",
                serde_json::json!({}),
                Arc::new(Session::new("/work")),
                capabilities(sink),
                || async { Ok(serde_json::Value::Null) },
            )
            .await
            .expect("execute");

        // Replacement kept position: a, k, b — and the new k allows.
        assert!(outcome.allowed);
        assert_eq!(*events.lock().unwrap(), vec!["a", "k", "b"]);

        let hooks = engine.pre.read().await;
        assert_eq!(hooks.len(), 3);
        assert_eq!(hooks[1].name(), "k");
    }

    #[tokio::test]
    async fn invocation_ids_are_unique() {
        let engine = HookEngine::new();
        let sink = RecordingSink::new();
        let session = Arc::new(Session::new("/work"));

        let first = engine
            .execute(
                "read_file",
                serde_json::json!({}),
                Arc::clone(&session),
                capabilities(Arc::clone(&sink)),
                || async { Ok(serde_json::Value::Null) },
            )
            .await
            .expect("first");
        let second = engine
            .execute(
                "read_file",
                serde_json::json!({}),
                session,
                capabilities(sink),
                || async { Ok(serde_json::Value::Null) },
            )
            .await
            .expect("second");

        assert_ne!(first.invocation_id, second.invocation_id);
    }
}
