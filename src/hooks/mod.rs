//! The bundled governance hooks.
//!
//! Pre-hooks, in their intended registration order:
//!
//! - **intent_gate** — denies destructive tools until the handshake binds an
//!   intent (`NO_ACTIVE_INTENT`)
//! - **scope_lock_gate** — owned-scope authorization plus the
//!   `observed_content_hash` optimistic lock (`SCOPE_VIOLATION`,
//!   `STALE_FILE`)
//! - **hitl_approval** — interactive approval for destructive tools without
//!   per-path scoping (`HITL_REJECT`)
//!
//! Post-hooks:
//!
//! - **audit_log** — one structured tracing event per invocation
//! - **trace_ledger** — JSONL audit record per successful mutation
//! - **post_process** — configured format/typecheck/test commands

pub mod approval;
pub mod audit;
pub mod intent_gate;
pub mod post_process;
pub mod scope_gate;
pub mod trace_ledger;

use std::sync::Arc;

pub use approval::HitlApprovalGate;
pub use audit::AuditHook;
pub use intent_gate::IntentGate;
pub use post_process::PostProcessHook;
pub use scope_gate::ScopeLockGate;
pub use trace_ledger::TraceLedgerWriter;

use crate::config::GovernanceConfig;
use crate::engine::HookEngine;
use crate::intent::{IntentMap, IntentStore};

/// Register the default governance pipeline on an engine.
pub async fn install_default_hooks(
    engine: &HookEngine,
    config: &GovernanceConfig,
    store: Arc<IntentStore>,
    map: Arc<IntentMap>,
) {
    engine.register_pre(Arc::new(IntentGate)).await;
    engine
        .register_pre(Arc::new(ScopeLockGate::new(
            store,
            engine.scope_expansions(),
            config.orchestration_dir.clone(),
            config.approval.timeout,
        )))
        .await;
    engine
        .register_pre(Arc::new(HitlApprovalGate::new(
            config.approval.gated_tools.clone(),
            config.approval.timeout,
        )))
        .await;

    engine.register_post(Arc::new(AuditHook)).await;
    engine
        .register_post(Arc::new(TraceLedgerWriter::new(
            map,
            config.orchestration_dir.clone(),
        )))
        .await;
    engine
        .register_post(Arc::new(PostProcessHook::new(
            config.post_process.commands.clone(),
            config.post_process.timeout,
        )))
        .await;
}
