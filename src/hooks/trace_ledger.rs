//! The trace ledger writer: one JSONL audit record per successful mutation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::classifier::{Classification, Risk};
use crate::diffing;
use crate::engine::{CompletedInvocation, InvocationContext, PostToolHook};
use crate::error::HookError;
use crate::hashing::{self, LineRange};
use crate::intent::IntentMap;
use crate::ledger::{
    self, Contributor, Conversation, ConversationMeta, FileTrace, RelatedLink, TraceRange,
    TraceRecord, VcsInfo,
};
use crate::payload::ToolPayload;
use crate::scope;

/// Payload keys lifted into related links, with the link type each carries.
const RELATED_KEYS: &[(&str, &str)] = &[
    ("related_specifications", "specification"),
    ("intent_ids", "specification"),
    ("requirement_ids", "requirement"),
    ("ticket_ids", "ticket"),
    ("requirement_links", "document"),
    ("related_links", "document"),
];

/// Post-hook appending a trace record for every allowed, error-free,
/// destructive invocation that resolved at least one file.
pub struct TraceLedgerWriter {
    map: Arc<IntentMap>,
    orchestration_dir: String,
}

impl TraceLedgerWriter {
    pub fn new(map: Arc<IntentMap>, orchestration_dir: impl Into<String>) -> Self {
        Self {
            map,
            orchestration_dir: orchestration_dir.into(),
        }
    }

    async fn related_links(
        &self,
        cwd: &Path,
        intent_id: &str,
        payload: &ToolPayload,
    ) -> Vec<RelatedLink> {
        let mut links = vec![RelatedLink::new("specification", intent_id)];
        for dep in self
            .map
            .dependencies_of(cwd, &self.orchestration_dir, intent_id)
            .await
        {
            links.push(RelatedLink::new("specification", dep));
        }
        for (key, link_type) in RELATED_KEYS {
            for value in payload.string_list(key) {
                links.push(RelatedLink::new(*link_type, value));
            }
        }
        // De-duplicate by (type, value), first occurrence wins.
        let mut seen = Vec::new();
        links.retain(|link| {
            let key = (link.link_type.clone(), link.value.clone());
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
        links
    }
}

/// Modified line ranges for one affected file, by tool-specific rule.
fn derive_ranges(cls: &Classification, payload: &ToolPayload, current: &str) -> Vec<LineRange> {
    let whole_file = || vec![LineRange::new(1, current.lines().count().max(1))];

    match cls.normalized_name.as_str() {
        "write_to_file" => whole_file(),
        "apply_diff" | "apply_patch" => match payload.diff_text() {
            Some(diff) => {
                let hunks = diffing::hunk_ranges(diff);
                if hunks.is_empty() { whole_file() } else { hunks }
            }
            None => whole_file(),
        },
        _ => payload
            .new_string()
            .and_then(|needle| diffing::line_span_of(current, needle))
            .map(|span| vec![span])
            .unwrap_or_else(whole_file),
    }
}

#[async_trait]
impl PostToolHook for TraceLedgerWriter {
    fn name(&self) -> &str {
        "trace_ledger"
    }

    async fn after(
        &self,
        ctx: &InvocationContext,
        outcome: &CompletedInvocation,
    ) -> Result<(), HookError> {
        let cls = &ctx.classification;
        if !outcome.allowed
            || outcome.error.is_some()
            || cls.risk != Risk::Destructive
            || cls.affected_files.is_empty()
        {
            return Ok(());
        }
        let Some(cwd) = ctx.session.cwd().cloned() else {
            return Ok(());
        };

        let revision_id = ledger::git_head(&cwd)
            .await
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let intent_id = ctx
            .session
            .active_intent()
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let url = ctx.session.conversation_url();
        let related = self.related_links(&cwd, &intent_id, &ctx.payload).await;

        let contributor = match ctx.session.agent() {
            Some(agent) => Contributor {
                entity_type: "AI".to_string(),
                model_identifier: agent.model_identifier.clone(),
                model_version: agent.model_version.clone(),
                agent_role: agent.agent_role.clone(),
                worker_id: agent.worker_id.clone(),
                supervisor_id: agent.supervisor_id.clone(),
            },
            None => Contributor {
                entity_type: "AI".to_string(),
                model_identifier: "unknown".to_string(),
                model_version: None,
                agent_role: None,
                worker_id: None,
                supervisor_id: None,
            },
        };

        let mut files = Vec::new();
        for file in &cls.affected_files {
            let rel = scope::relative_posix(&cwd, file);
            // Unreadable files are skipped silently; there is nothing to
            // fingerprint.
            let Ok(current) = tokio::fs::read_to_string(cwd.join(&rel)).await else {
                continue;
            };

            let ranges = derive_ranges(cls, &ctx.payload, &current)
                .into_iter()
                .map(|range| {
                    let hash =
                        hashing::hash_region(&rel, &current, Some(range), ctx.payload.content());
                    TraceRange {
                        start_line: range.start_line,
                        end_line: range.end_line,
                        content_hash: hash.digest,
                    }
                })
                .collect();

            files.push(FileTrace {
                relative_path: rel,
                conversations: vec![Conversation {
                    url: url.clone(),
                    contributor: contributor.clone(),
                    ranges,
                    related: related.clone(),
                    meta: ConversationMeta {
                        mutation_class: cls.mutation_class,
                        mutation_confidence: cls.confidence,
                        mutation_signals: cls.signals.clone(),
                        hook_invocation_id: ctx.invocation_id.to_string(),
                    },
                }],
            });
        }

        if files.is_empty() {
            tracing::debug!(
                invocation = %ctx.invocation_id,
                "no affected file was readable, skipping trace record"
            );
            return Ok(());
        }

        let record = TraceRecord {
            id: ctx.invocation_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            vcs: VcsInfo { revision_id },
            files,
        };
        let path = ledger::ledger_path(&cwd, &self.orchestration_dir);
        ledger::append_record(&path, &record).map_err(|e| HookError::failed("trace_ledger", e.to_string()))
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
    use crate::session::{AgentMeta, Session};

    struct NullSink;
    impl ResultSink for NullSink {
        fn push(&self, _payload: String) {}
    }

    fn writer() -> TraceLedgerWriter {
        TraceLedgerWriter::new(Arc::new(IntentMap::new()), ".orchestration")
    }

    fn ctx_for(
        tool: &str,
        payload: serde_json::Value,
        session: Arc<Session>,
    ) -> InvocationContext {
        let payload = ToolPayload::new(payload);
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
            result: Some(serde_json::json!({"ok": true})),
            error: None,
        }
    }

    async fn seeded_session(tmp: &tempfile::TempDir) -> Arc<Session> {
        let file = tmp.path().join("src/auth/middleware.ts");
        tokio::fs::create_dir_all(file.parent().unwrap())
            .await
            .expect("mkdir");
        tokio::fs::write(&file, "export const ok = true\n")
            .await
            .expect("write");

        let session = Session::new(tmp.path()).with_task("t1").with_agent(AgentMeta {
            model_identifier: "claude-sonnet".to_string(),
            model_version: Some("4.5".to_string()),
            agent_role: Some("implementer".to_string()),
            worker_id: None,
            supervisor_id: None,
        });
        session.set_active_intent("INT-001");
        Arc::new(session)
    }

    async fn read_ledger(tmp: &tempfile::TempDir) -> Vec<serde_json::Value> {
        let raw = tokio::fs::read_to_string(
            tmp.path().join(".orchestration/agent_trace.jsonl"),
        )
        .await
        .unwrap_or_default();
        raw.lines()
            .map(|l| serde_json::from_str(l).expect("valid json line"))
            .collect()
    }

    #[tokio::test]
    async fn writes_one_record_for_a_successful_write() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = seeded_session(&tmp).await;
        let ctx = ctx_for(
            "write_to_file",
            serde_json::json!({
                "path": "src/auth/middleware.ts",
                "content": "export const ok = true\n",
            }),
            session,
        );

        writer().after(&ctx, &success()).await.expect("ledger");

        let records = read_ledger(&tmp).await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["id"], ctx.invocation_id.to_string());
        assert_eq!(
            record["files"][0]["relative_path"],
            "src/auth/middleware.ts"
        );
        let conv = &record["files"][0]["conversations"][0];
        assert_eq!(conv["url"], "roo://task/t1");
        assert_eq!(conv["contributor"]["entity_type"], "AI");
        assert_eq!(conv["contributor"]["model_identifier"], "claude-sonnet");
        assert_eq!(conv["ranges"][0]["start_line"], 1);
        assert_eq!(conv["ranges"][0]["end_line"], 1);
        assert!(
            conv["ranges"][0]["content_hash"]
                .as_str()
                .unwrap()
                .starts_with("sha256:")
        );
        assert_eq!(conv["related"][0]["type"], "specification");
        assert_eq!(conv["related"][0]["value"], "INT-001");
        assert_eq!(conv["meta"]["hook_invocation_id"], ctx.invocation_id.to_string());
    }

    #[tokio::test]
    async fn skips_denied_errored_and_safe_outcomes() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = seeded_session(&tmp).await;

        let ctx = ctx_for(
            "write_to_file",
            serde_json::json!({"path": "src/auth/middleware.ts", "content": "x"}),
            Arc::clone(&session),
        );
        let denied = CompletedInvocation {
            allowed: false,
            denial_reason: Some("scope".to_string()),
            result: None,
            error: None,
        };
        writer().after(&ctx, &denied).await.expect("denied");

        let errored = CompletedInvocation {
            allowed: true,
            denial_reason: None,
            result: None,
            error: Some("disk full".to_string()),
        };
        writer().after(&ctx, &errored).await.expect("errored");

        let safe_ctx = ctx_for(
            "read_file",
            serde_json::json!({"path": "src/auth/middleware.ts"}),
            session,
        );
        writer().after(&safe_ctx, &success()).await.expect("safe");

        assert!(read_ledger(&tmp).await.is_empty());
    }

    #[tokio::test]
    async fn hunk_headers_drive_diff_ranges() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = seeded_session(&tmp).await;
        let diff = "\
--- a/src/auth/middleware.ts
+++ b/src/auth/middleware.ts
@@ -1,1 +1,2 @@
 export const ok = true
+export const extra = true
";
        let ctx = ctx_for(
            "apply_diff",
            serde_json::json!({"path": "src/auth/middleware.ts", "diff": diff}),
            session,
        );
        writer().after(&ctx, &success()).await.expect("ledger");

        let records = read_ledger(&tmp).await;
        let ranges = &records[0]["files"][0]["conversations"][0]["ranges"];
        assert_eq!(ranges[0]["start_line"], 1);
        assert_eq!(ranges[0]["end_line"], 2);
    }

    #[tokio::test]
    async fn intent_map_dependencies_enrich_related_links() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = seeded_session(&tmp).await;
        tokio::fs::create_dir_all(tmp.path().join(".orchestration"))
            .await
            .expect("mkdir");
        tokio::fs::write(
            tmp.path().join(".orchestration/intent_map.md"),
            "## INT-001\n**Depends on:**\n- `INT-000`\n",
        )
        .await
        .expect("write map");

        let ctx = ctx_for(
            "write_to_file",
            serde_json::json!({
                "path": "src/auth/middleware.ts",
                "content": "x",
                "ticket_ids": "JIRA-7",
                "intent_ids": ["INT-001", "INT-000"],
            }),
            session,
        );
        writer().after(&ctx, &success()).await.expect("ledger");

        let records = read_ledger(&tmp).await;
        let related = records[0]["files"][0]["conversations"][0]["related"]
            .as_array()
            .unwrap()
            .clone();
        let pairs: Vec<(String, String)> = related
            .iter()
            .map(|l| {
                (
                    l["type"].as_str().unwrap().to_string(),
                    l["value"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        // Active intent first, dependency next, payload lifts after,
        // de-duplicated.
        assert_eq!(
            pairs,
            vec![
                ("specification".to_string(), "INT-001".to_string()),
                ("specification".to_string(), "INT-000".to_string()),
                ("ticket".to_string(), "JIRA-7".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped_silently() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = seeded_session(&tmp).await;
        let ctx = ctx_for(
            "write_to_file",
            serde_json::json!({"path": "src/auth/never_written.ts", "content": "x"}),
            session,
        );
        writer().after(&ctx, &success()).await.expect("no error");
        assert!(read_ledger(&tmp).await.is_empty());
    }

    #[tokio::test]
    async fn new_string_span_drives_edit_ranges() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = seeded_session(&tmp).await;
        let file = tmp.path().join("src/auth/middleware.ts");
        tokio::fs::write(&file, "a\nb\ntarget line\nd\n")
            .await
            .expect("write");

        let ctx = ctx_for(
            "edit",
            serde_json::json!({
                "path": "src/auth/middleware.ts",
                "new_string": "target line",
            }),
            session,
        );
        writer().after(&ctx, &success()).await.expect("ledger");

        let records = read_ledger(&tmp).await;
        let ranges = &records[0]["files"][0]["conversations"][0]["ranges"];
        assert_eq!(ranges[0]["start_line"], 3);
        assert_eq!(ranges[0]["end_line"], 3);
    }
}
