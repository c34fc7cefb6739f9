//! Toolgate — deterministic tool governance for AI coding agents.
//!
//! An LLM agent proposes mutating operations (write a file, apply a diff,
//! run a command) at unpredictable cadence. Toolgate stands between the
//! agent and the tool runtimes and makes every invocation pass a
//! deterministic gate chain:
//!
//! 1. the [`engine::HookEngine`] wraps each call in an ordered
//!    pre-check / execute / post-process pipeline with contained failures;
//! 2. the [`classifier`] derives risk and mutation class from the opaque
//!    payload;
//! 3. the scope & lock gate authorizes paths against the active intent's
//!    owned globs and enforces optimistic locking over content hashes;
//! 4. the trace ledger appends one JSONL audit record per mutation, binding
//!    it to an intent, line ranges, and canonical content fingerprints.
//!
//! The surrounding environment supplies tool runtimes, an approval surface,
//! and a result channel through the [`engine::Capabilities`] seam; Toolgate
//! supplies the policy.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use toolgate::config::GovernanceConfig;
//! use toolgate::engine::{
//!     ApprovalDecision, Capabilities, HookEngine, SessionResultSink, StaticApprovalGate,
//!     TracingErrorSink,
//! };
//! use toolgate::hooks::install_default_hooks;
//! use toolgate::intent::{IntentMap, IntentStore};
//! use toolgate::session::Session;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GovernanceConfig::from_env()?;
//! let engine = HookEngine::new();
//! install_default_hooks(
//!     &engine,
//!     &config,
//!     Arc::new(IntentStore::new()),
//!     Arc::new(IntentMap::new()),
//! )
//! .await;
//!
//! let session = Arc::new(Session::new("/work/repo").with_task("task-1"));
//! let capabilities = Capabilities {
//!     approval: Arc::new(StaticApprovalGate::new(ApprovalDecision::Reject)),
//!     results: Arc::new(SessionResultSink::new(Arc::clone(&session))),
//!     errors: Arc::new(TracingErrorSink),
//! };
//!
//! let outcome = engine
//!     .execute(
//!         "write_to_file",
//!         serde_json::json!({"path": "src/auth/login.ts", "content": "export {}\n"}),
//!         session,
//!         capabilities,
//!         || async { Ok(serde_json::json!({"written": true})) },
//!     )
//!     .await?;
//! assert!(!outcome.allowed, "no handshake ran, so the write is denied");
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod diffing;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod hooks;
pub mod intent;
pub mod ledger;
pub mod payload;
pub mod scope;
pub mod session;
pub mod tool_error;

pub use classifier::{Classification, MutationClass, MutationConfidence, Risk};
pub use engine::{ExecuteOutcome, HookDecision, HookEngine, PostToolHook, PreToolHook};
pub use error::{Error, Result};
pub use hashing::{ContentHash, HashStrategy, LineRange};
pub use payload::ToolPayload;
pub use session::{AgentMeta, Session};
pub use tool_error::{ToolErrorBody, ToolErrorCode};
