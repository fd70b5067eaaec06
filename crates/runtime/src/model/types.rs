use crate::schema::FunctionTool;
use mcp::{ToolResult, ToolStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// A resolved tool invocation, kept for the transcript and for display.
///
/// Records are only constructed with a final status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub result: String,
    pub status: ToolStatus,
}

impl ToolCallRecord {
    pub fn success(call: &ToolCall, result: impl Into<String>) -> Self {
        Self::resolved(call, ToolStatus::Success, result.into())
    }

    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self::resolved(call, ToolStatus::Error, message.into())
    }

    /// Record for a call that could not be dispatched because no tool
    /// server was active.
    pub fn unavailable(call: &ToolCall) -> Self {
        Self::resolved(call, ToolStatus::Error, String::new())
    }

    pub fn from_result(call: &ToolCall, result: ToolResult) -> Self {
        Self::resolved(call, result.status, result.payload)
    }

    fn resolved(call: &ToolCall, status: ToolStatus, result: String) -> Self {
        Self {
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            status,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    /// The originating call, as sent back to the backend.
    pub fn call(&self) -> ToolCall {
        ToolCall::new(&self.tool_name, self.arguments.clone())
    }

    /// One transcript line for the tool-role summary message.
    pub fn summary_line(&self) -> String {
        let name = &self.tool_name;
        let result = &self.result;
        match self.status {
            ToolStatus::Success => format!("Tool '{name}' result: {result}"),
            ToolStatus::Error => format!("Tool '{name}' failed: {result}"),
        }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A tool-role message summarizing every record, one line each.
    pub fn tool_summary(records: &[ToolCallRecord]) -> Self {
        let lines: Vec<String> = records.iter().map(ToolCallRecord::summary_line).collect();
        Self::new(Role::Tool, lines.join("\n"))
    }

    pub fn with_tool_calls(mut self, records: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = records;
        self
    }
}

/// Everything needed for one chat request.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [FunctionTool],
    pub stream: bool,
}

/// The assistant's reply to a chat request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// Set when the content was synthesized from a transport failure.
    pub failed: bool,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// An assistant reply describing a failure to reach the backend.
    pub fn failure(reason: impl std::fmt::Display) -> Self {
        Self {
            content: format!("Error communicating with Ollama: {reason}"),
            tool_calls: Vec::new(),
            failed: true,
        }
    }
}

/// Tool calls requested by the assistant, in the order returned.
pub fn extract_tool_calls(response: &ChatResponse) -> Vec<ToolCall> {
    response.tool_calls.clone()
}

/// Trait for LLM chat backends.
///
/// Backend faults never surface as errors: listing degrades to an empty
/// list and chat degrades to a synthesized assistant reply.
pub trait Backend: Send + Sync {
    fn list_models(&self) -> impl Future<Output = Vec<String>> + Send;

    fn check_connection(&self) -> impl Future<Output = bool> + Send;

    fn chat(&self, request: ChatRequest<'_>) -> impl Future<Output = ChatResponse> + Send;
}
