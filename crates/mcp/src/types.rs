//! Tool definitions and invocation results.

use rmcp::model::{CallToolResult, RawContent, Tool};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool exposed by a tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's arguments, if the server declared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_schema: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = Some(schema);
        self
    }
}

impl From<Tool> for ToolDefinition {
    fn from(tool: Tool) -> Self {
        let schema = tool.input_schema.as_ref().clone();
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
            // An empty schema object carries no information.
            parameter_schema: (!schema.is_empty()).then_some(Value::Object(schema)),
        }
    }
}

/// Whether a tool invocation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// Outcome of one tool invocation. Faults are carried as `status=error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub payload: String,
}

impl ToolResult {
    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            payload: payload.into(),
        }
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            payload: payload.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

impl From<CallToolResult> for ToolResult {
    fn from(result: CallToolResult) -> Self {
        let is_error = result.is_error.unwrap_or(false);
        let texts: Vec<String> = result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect();

        let payload = if texts.is_empty() {
            serde_json::to_string(&result.content).unwrap_or_default()
        } else {
            texts.join("\n")
        };

        if is_error {
            Self::error(payload)
        } else {
            Self::success(payload)
        }
    }
}
