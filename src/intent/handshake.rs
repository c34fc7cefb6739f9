//! Intent selection: binding a session to an active intent.
//!
//! The handshake is required before any mutating tool runs. Its return value
//! is an XML-shaped context block the agent adapter injects into the
//! conversation.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::IntentError;
use crate::intent::store::IntentStore;
use crate::session::Session;

static INTENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._:-]{1,128}$").expect("intent id regex"));

/// Select `intent_id` as the session's active intent.
///
/// Returns the `<intent_context>` block describing the bound intent.
pub async fn select_intent(
    store: &IntentStore,
    session: &Session,
    orchestration_dir: &str,
    intent_id: &str,
) -> Result<String, IntentError> {
    if !INTENT_ID.is_match(intent_id) {
        return Err(IntentError::InvalidId {
            id: intent_id.to_string(),
        });
    }
    let cwd = session.cwd().ok_or(IntentError::NoWorkingDirectory)?;

    let intent = store
        .find(cwd, orchestration_dir, intent_id)
        .await
        .ok_or_else(|| IntentError::NotFound {
            id: intent_id.to_string(),
        })?;

    session.set_active_intent(&intent.id);
    tracing::info!(intent = %intent.id, "handshake complete");

    let mut out = String::from("<intent_context>\n");
    out.push_str(&format!("  <id>{}</id>\n", xml_escape(&intent.id)));
    out.push_str("  <owned_scope>\n");
    for glob in &intent.owned_scope {
        out.push_str(&format!("    <glob>{}</glob>\n", xml_escape(glob)));
    }
    out.push_str("  </owned_scope>\n");
    out.push_str("  <constraints>\n");
    for item in &intent.constraints {
        out.push_str(&format!("    <item>{}</item>\n", xml_escape(item)));
    }
    out.push_str("  </constraints>\n");
    out.push_str("  <acceptance_criteria>\n");
    for item in &intent.acceptance_criteria {
        out.push_str(&format!("    <item>{}</item>\n", xml_escape(item)));
    }
    out.push_str("  </acceptance_criteria>\n");
    out.push_str("</intent_context>");
    Ok(out)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
