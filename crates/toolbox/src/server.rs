//! In-process tool server.

use mcp::{ToolDefinition, ToolResult, ToolServer};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::{calculator, lookup};

/// Serves the builtin tools without a child process.
#[derive(Debug, Clone)]
pub struct BuiltinServer {
    identity: String,
}

impl BuiltinServer {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            string_tool(
                "calculator",
                "Evaluate a mathematical expression (e.g. \"2 + 2\", \"840 * 0.25\"). \
                 Supports + - * / // % **, parentheses and abs, round, min, max, sum, pow, sqrt.",
                "expression",
                "A mathematical expression to evaluate",
            ),
            string_tool(
                "get_weather",
                "Get current weather for a location",
                "location",
                "City name or location to get weather for",
            ),
            string_tool(
                "web_search",
                "Search the web for information",
                "query",
                "Search query string",
            ),
        ]
    }
}

impl Default for BuiltinServer {
    fn default() -> Self {
        Self::new("builtin")
    }
}

fn string_tool(
    name: &str,
    description: &str,
    param: &str,
    param_description: &str,
) -> ToolDefinition {
    ToolDefinition::new(name, description).with_schema(json!({
        "type": "object",
        "properties": {
            param: {"type": "string", "description": param_description}
        },
        "required": [param]
    }))
}

fn string_arg<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str)
}

impl ToolServer for BuiltinServer {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn connect(&mut self) -> mcp::Result<()> {
        Ok(())
    }

    async fn list_tools(&mut self) -> mcp::Result<Vec<ToolDefinition>> {
        Ok(Self::definitions())
    }

    async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> ToolResult {
        let param = match name {
            "calculator" => "expression",
            "get_weather" => "location",
            "web_search" => "query",
            other => {
                warn!(tool = other, "unknown builtin tool");
                return ToolResult::error(format!("Error calling tool '{other}': unknown tool"));
            }
        };
        let Some(value) = string_arg(&arguments, param) else {
            return ToolResult::error(format!(
                "Error calling tool '{name}': missing string argument '{param}'"
            ));
        };

        info!(tool = name, argument = value, "running builtin tool");
        let result = match name {
            "calculator" => match calculator::calculate(value) {
                Ok(result) => ToolResult::success(result),
                Err(message) => {
                    warn!(tool = name, "{message}");
                    ToolResult::error(message)
                }
            },
            "get_weather" => ToolResult::success(lookup::weather(value)),
            _ => ToolResult::success(lookup::search(value)),
        };
        info!(tool = name, result = %result.payload, "builtin tool finished");
        result
    }

    async fn check_health(&mut self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::ToolStatus;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn lists_three_tools_with_schemas() {
        let mut server = BuiltinServer::default();
        assert_eq!(server.identity(), "builtin");

        let tools = server.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["calculator", "get_weather", "web_search"]);
        assert_eq!(
            tools[0].parameter_schema.as_ref().unwrap()["required"],
            json!(["expression"])
        );
        assert!(server.check_health().await);
    }

    #[tokio::test]
    async fn calculator_call() {
        let mut server = BuiltinServer::default();
        let result = server
            .call_tool("calculator", args(json!({"expression": "840*0.25"})))
            .await;
        assert_eq!(result, ToolResult::success("210.0"));

        let failed = server
            .call_tool("calculator", args(json!({"expression": "1/0"})))
            .await;
        assert_eq!(failed.status, ToolStatus::Error);
        assert_eq!(failed.payload, "Error calculating '1/0': division by zero");
    }

    #[tokio::test]
    async fn weather_and_search_calls() {
        let mut server = BuiltinServer::new("local");
        let weather = server
            .call_tool("get_weather", args(json!({"location": "London"})))
            .await;
        assert_eq!(weather.payload, "10°C, Rainy");

        let search = server
            .call_tool("web_search", args(json!({"query": "python tips"})))
            .await;
        assert!(search.payload.starts_with("Search results for 'python tips': Python"));
    }

    #[tokio::test]
    async fn bad_calls_are_errors() {
        let mut server = BuiltinServer::default();
        let unknown = server.call_tool("rm", Map::new()).await;
        assert!(unknown.is_error());
        assert_eq!(unknown.payload, "Error calling tool 'rm': unknown tool");

        let missing = server.call_tool("get_weather", Map::new()).await;
        assert!(missing.is_error());
        assert!(missing.payload.contains("'location'"));
    }
}
