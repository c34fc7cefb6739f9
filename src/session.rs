//! Per-agent session state.

use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

/// Metadata identifying the agent acting in a session.
#[derive(Debug, Clone, Default)]
pub struct AgentMeta {
    pub model_identifier: String,
    pub model_version: Option<String>,
    pub agent_role: Option<String>,
    pub worker_id: Option<String>,
    pub supervisor_id: Option<String>,
}

/// Conversation-scoped state shared by every hook of every invocation.
///
/// The active intent and the user-message sink are interior-mutable: the
/// handshake binds the intent mid-session, and hooks append messages the
/// agent will see on its next turn.
#[derive(Debug, Default)]
pub struct Session {
    cwd: Option<PathBuf>,
    task_id: Option<String>,
    instance_id: Option<String>,
    agent: Option<AgentMeta>,
    active_intent: RwLock<Option<String>>,
    messages: Mutex<Vec<String>>,
}

impl Session {
    /// A session rooted at the given working directory.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }

    /// A session with no working directory (read-only surfaces).
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_agent(mut self, agent: AgentMeta) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    pub fn agent(&self) -> Option<&AgentMeta> {
        self.agent.as_ref()
    }

    /// The currently bound intent id, if the handshake has run.
    pub fn active_intent(&self) -> Option<String> {
        self.active_intent
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Bind (or supersede) the active intent.
    pub fn set_active_intent(&self, intent_id: impl Into<String>) {
        let id = intent_id.into();
        tracing::debug!(intent = %id, "session intent bound");
        *self
            .active_intent
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(id);
    }

    /// Append a text segment for the agent's next turn.
    pub fn push_message(&self, text: impl Into<String>) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.into());
    }

    /// Take all pending messages, leaving the sink empty.
    pub fn drain_messages(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// The conversation URL recorded in trace records.
    pub fn conversation_url(&self) -> String {
        match (&self.task_id, &self.instance_id) {
            (Some(task), Some(instance)) => {
                format!("roo://task/{task}/instance/{instance}")
            }
            (Some(task), None) => format!("roo://task/{task}"),
            _ => "roo://task/unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_url_variants() {
        let s = Session::new("/work").with_task("t1").with_instance("i1");
        assert_eq!(s.conversation_url(), "roo://task/t1/instance/i1");

        let s = Session::new("/work").with_task("t1");
        assert_eq!(s.conversation_url(), "roo://task/t1");

        let s = Session::new("/work");
        assert_eq!(s.conversation_url(), "roo://task/unknown");
    }

    #[test]
    fn intent_binding_is_observable() {
        let s = Session::new("/work");
        assert!(s.active_intent().is_none());
        s.set_active_intent("INT-001");
        assert_eq!(s.active_intent().as_deref(), Some("INT-001"));
        s.set_active_intent("INT-002");
        assert_eq!(s.active_intent().as_deref(), Some("INT-002"));
    }

    #[test]
    fn message_sink_preserves_order_and_drains() {
        let s = Session::new("/work");
        s.push_message("first");
        s.push_message("second");
        assert_eq!(s.drain_messages(), vec!["first", "second"]);
        assert!(s.drain_messages().is_empty());
    }
}
