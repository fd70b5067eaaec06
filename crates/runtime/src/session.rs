//! Chat session state.

use crate::model::{Message, Role, ToolCallRecord};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// A unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation: history plus the per-session choices that shape a turn.
///
/// History only grows through completed turns; an abandoned turn leaves no
/// trace.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: SessionId,
    model: String,
    use_tools: bool,
    server: Option<String>,
    system: Option<String>,
    messages: Vec<Message>,
}

impl ChatSession {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            model: model.into(),
            use_tools: true,
            server: None,
            system: None,
            messages: Vec::new(),
        }
    }

    /// Set the system prompt. It is sent first on every request but never
    /// stored in history.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.use_tools = enabled;
        self
    }

    pub fn with_server(mut self, server: Option<String>) -> Self {
        self.server = server;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn use_tools(&self) -> bool {
        self.use_tools
    }

    pub fn set_use_tools(&mut self, enabled: bool) {
        self.use_tools = enabled;
    }

    /// Identity of the selected tool server.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn select_server(&mut self, server: Option<String>) {
        self.server = server;
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tool-call records of the most recent turn that used tools.
    pub fn last_tool_calls(&self) -> &[ToolCallRecord] {
        self.messages
            .iter()
            .rev()
            .take_while(|m| m.role != Role::User)
            .find(|m| !m.tool_calls.is_empty())
            .map(|m| m.tool_calls.as_slice())
            .unwrap_or(&[])
    }

    /// Discard all history.
    pub fn clear(&mut self) {
        info!(session = %self.id, messages = self.messages.len(), "clearing session");
        self.messages.clear();
    }

    /// Fall back to the first available model when the selected one is
    /// absent. Returns the replaced model id, if any.
    pub fn resolve_model(&mut self, available: &[String]) -> Result<Option<String>> {
        let Some(first) = available.first() else {
            return Err(Error::Config("no models available".into()));
        };
        if available.iter().any(|m| *m == self.model) {
            return Ok(None);
        }

        warn!(requested = %self.model, fallback = %first, "model not available, falling back");
        Ok(Some(std::mem::replace(&mut self.model, first.clone())))
    }

    /// Drop a server selection that is not among the known identities.
    /// Returns whether a usable server remains selected.
    pub fn resolve_server<'a>(&mut self, known: impl IntoIterator<Item = &'a str>) -> bool {
        let Some(selected) = self.server.as_deref() else {
            return false;
        };
        if known.into_iter().any(|name| name == selected) {
            return true;
        }

        warn!(server = %selected, "selected tool server is not configured, tools disabled");
        self.server = None;
        false
    }

    /// Append the messages of a completed turn.
    pub(crate) fn commit_turn(&mut self, messages: Vec<Message>) {
        self.messages.extend(messages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolCall;
    use serde_json::Map;

    #[test]
    fn new_session_defaults() {
        let session = ChatSession::new("granite4:350m");
        assert_eq!(session.model(), "granite4:350m");
        assert!(session.use_tools());
        assert!(session.server().is_none());
        assert!(session.is_empty());
    }

    #[test]
    fn model_fallback() {
        let mut session = ChatSession::new("missing:latest");
        let available = vec!["granite4:350m".to_string(), "llama3.2".to_string()];

        let replaced = session.resolve_model(&available).unwrap();
        assert_eq!(replaced.as_deref(), Some("missing:latest"));
        assert_eq!(session.model(), "granite4:350m");

        assert_eq!(session.resolve_model(&available).unwrap(), None);
        assert!(session.resolve_model(&[]).is_err());
    }

    #[test]
    fn unknown_server_disables_tools() {
        let mut session = ChatSession::new("m").with_server(Some("weather".into()));
        assert!(session.resolve_server(["calculator", "weather"]));
        assert_eq!(session.server(), Some("weather"));

        assert!(!session.resolve_server(["calculator"]));
        assert!(session.server().is_none());
    }

    #[test]
    fn last_tool_calls_come_from_latest_turn() {
        let call = ToolCall::new("calculator", Map::new());
        let mut session = ChatSession::new("m");
        session.commit_turn(vec![
            Message::user("first"),
            Message::assistant("").with_tool_calls(vec![ToolCallRecord::success(&call, "1")]),
            Message::tool_summary(&[ToolCallRecord::success(&call, "1")]),
            Message::assistant("one"),
        ]);
        assert_eq!(session.last_tool_calls().len(), 1);

        session.commit_turn(vec![Message::user("second"), Message::assistant("two")]);
        assert!(session.last_tool_calls().is_empty());

        session.clear();
        assert!(session.is_empty());
    }
}
