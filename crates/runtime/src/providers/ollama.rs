//! Ollama chat API backend.

use crate::model::{Backend, ChatRequest, ChatResponse, Message, ModelError, Role, ToolCall};
use crate::schema::FunctionTool;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

const CHAT_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [FunctionTool],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ApiOptions>,
}

fn no_tools(tools: &&[FunctionTool]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Conversion
// ─────────────────────────────────────────────────────────────────────────────

fn message_to_api(msg: &Message) -> ApiMessage {
    ApiMessage {
        role: msg.role,
        content: msg.content.clone(),
        tool_calls: msg
            .tool_calls
            .iter()
            .map(|record| ApiToolCall {
                function: ApiFunctionCall {
                    name: record.tool_name.clone(),
                    arguments: Value::Object(record.arguments.clone()),
                },
            })
            .collect(),
    }
}

/// Decode call arguments, which arrive either as an object or as a
/// JSON-encoded string.
fn decode_arguments(name: &str, arguments: Value) -> Map<String, Value> {
    match arguments {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        Value::String(raw) if raw.trim().is_empty() => Map::new(),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(tool = name, arguments = %raw, "tool arguments are not a JSON object");
                Map::new()
            }
        },
        other => {
            warn!(tool = name, arguments = %other, "tool arguments are not a JSON object");
            Map::new()
        }
    }
}

fn calls_from_api(calls: Vec<ApiToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|call| {
            let arguments = decode_arguments(&call.function.name, call.function.arguments);
            ToolCall::new(call.function.name, arguments)
        })
        .collect()
}

/// Fold one or more response bodies (a single object, or NDJSON chunks when
/// streaming) into one reply.
fn parse_chat_body(body: &str) -> std::result::Result<ChatResponse, ModelError> {
    let mut response = ChatResponse::default();
    let mut seen = false;

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let chunk: ApiResponse = serde_json::from_str(line)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        if let Some(err) = chunk.error {
            return Err(ModelError::Api(err));
        }
        if let Some(message) = chunk.message {
            seen = true;
            response.content.push_str(&message.content);
            response.tool_calls.extend(calls_from_api(message.tool_calls));
        }
    }

    if !seen {
        return Err(ModelError::InvalidResponse("response has no message".into()));
    }
    Ok(response)
}

/// Canonicalize the model list.
///
/// Accepts `{"models": [{"name": ..}]}`, `{"models": [{"model": ..}]}`,
/// `{"models": ["id"]}` and a bare array of either.
pub fn parse_model_list(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("models") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(id) => Some(id.clone()),
            Value::Object(entry) => ["name", "model"]
                .iter()
                .filter_map(|key| entry.get(*key).and_then(Value::as_str))
                .find(|id| !id.is_empty())
                .map(str::to_string),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    host: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl OllamaBackendBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            temperature: None,
            timeout: CHAT_TIMEOUT,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Upper bound on one chat request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OllamaBackend> {
        let host = self.host.trim().trim_end_matches('/').to_string();
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(Error::Config(format!(
                "backend host must be an http(s) URL, got '{host}'"
            )));
        }

        Ok(OllamaBackend {
            client: reqwest::Client::new(),
            host,
            temperature: self.temperature,
            timeout: self.timeout,
        })
    }
}

/// Ollama API backend.
pub struct OllamaBackend {
    client: reqwest::Client,
    host: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn builder(host: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn fetch_tags(&self) -> std::result::Result<Value, ModelError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.host))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ModelError::from_reqwest(e, PROBE_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))
    }

    async fn send(
        &self,
        request: ChatRequest<'_>,
    ) -> std::result::Result<ChatResponse, ModelError> {
        let api_request = ApiRequest {
            model: request.model,
            messages: request.messages.iter().map(message_to_api).collect(),
            tools: request.tools,
            stream: request.stream,
            options: self.temperature.map(|temperature| ApiOptions { temperature }),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .timeout(self.timeout)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            // Ollama reports e.g. unknown models as `{"error": ...}` with a 404.
            let parsed = serde_json::from_str::<ApiResponse>(&body);
            if let Ok(ApiResponse {
                error: Some(err), ..
            }) = parsed
            {
                return Err(ModelError::Api(err));
            }
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_chat_body(&body)
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({})", self.host)
    }
}

impl Backend for OllamaBackend {
    async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(value) => {
                let models = parse_model_list(&value);
                info!(count = models.len(), "available models");
                models
            }
            Err(e) => {
                error!(error = %e, "error listing models");
                Vec::new()
            }
        }
    }

    async fn check_connection(&self) -> bool {
        match self.fetch_tags().await {
            Ok(_) => {
                debug!(host = %self.host, "backend connection successful");
                true
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "backend connection failed");
                false
            }
        }
    }

    async fn chat(&self, request: ChatRequest<'_>) -> ChatResponse {
        info!(
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat request"
        );

        match self.send(request).await {
            Ok(response) => {
                debug!(
                    content = %response.content,
                    tool_calls = response.tool_calls.len(),
                    "received chat response"
                );
                response
            }
            Err(e) => {
                error!(error = %e, "error in chat request");
                ChatResponse::failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolCallRecord;
    use crate::schema::translate;
    use mcp::ToolDefinition;
    use serde_json::json;

    #[test]
    fn model_list_shapes() {
        let expected = vec!["granite4:350m".to_string(), "llama3.2:latest".to_string()];

        let by_name = json!({"models": [{"name": "granite4:350m"}, {"name": "llama3.2:latest"}]});
        let by_model =
            json!({"models": [{"model": "granite4:350m"}, {"model": "llama3.2:latest"}]});
        let strings = json!({"models": ["granite4:350m", "llama3.2:latest"]});
        let bare = json!(["granite4:350m", {"model": "llama3.2:latest"}]);

        assert_eq!(parse_model_list(&by_name), expected);
        assert_eq!(parse_model_list(&by_model), expected);
        assert_eq!(parse_model_list(&strings), expected);
        assert_eq!(parse_model_list(&bare), expected);
    }

    #[test]
    fn model_list_tolerates_garbage() {
        assert!(parse_model_list(&json!({"models": null})).is_empty());
        assert!(parse_model_list(&json!("nope")).is_empty());
        assert!(parse_model_list(&json!({"models": [{"size": 1}, {"name": ""}]})).is_empty());
    }

    #[test]
    fn blank_name_falls_back_to_model() {
        let value = json!({"models": [
            {"name": null, "model": "granite4:350m"},
            {"name": "", "model": "llama3.2:latest"}
        ]});
        assert_eq!(
            parse_model_list(&value),
            vec!["granite4:350m".to_string(), "llama3.2:latest".to_string()]
        );
    }

    #[test]
    fn parses_tool_calls_with_object_arguments() {
        let body = json!({
            "model": "granite4:350m",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "calculator", "arguments": {"expression": "840*0.25"}}}
                ]
            },
            "done": true
        })
        .to_string();

        let response = parse_chat_body(&body).unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "calculator");
        assert_eq!(response.tool_calls[0].arguments["expression"], "840*0.25");
    }

    #[test]
    fn parses_tool_calls_with_string_arguments() {
        let body = json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {
                        "name": "get_weather",
                        "arguments": "{\"location\":\"Seattle\"}"
                    }},
                    {"function": {"name": "web_search", "arguments": "not json"}}
                ]
            }
        })
        .to_string();

        let response = parse_chat_body(&body).unwrap();
        assert_eq!(response.tool_calls[0].arguments["location"], "Seattle");
        assert!(response.tool_calls[1].arguments.is_empty());
    }

    #[test]
    fn folds_streamed_chunks() {
        let body = [
            json!({"message": {"role": "assistant", "content": "25% of 840 "}, "done": false}),
            json!({"message": {"role": "assistant", "content": "is 210."}, "done": false}),
            json!({"done": true}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");

        let response = parse_chat_body(&body).unwrap();
        assert_eq!(response.content, "25% of 840 is 210.");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn error_body_is_reported() {
        let body = json!({"error": "model 'nope' not found"}).to_string();
        assert!(matches!(parse_chat_body(&body), Err(ModelError::Api(_))));
        assert!(matches!(parse_chat_body("{}"), Err(ModelError::InvalidResponse(_))));
        assert!(matches!(parse_chat_body("<html>"), Err(ModelError::InvalidResponse(_))));
    }

    #[test]
    fn request_serializes_tools_and_tool_calls() {
        let args = json!({"expression": "1+1"}).as_object().cloned().unwrap();
        let call = ToolCall::new("calculator", args);
        let messages = vec![
            Message::user("What's 1+1?"),
            Message::assistant("").with_tool_calls(vec![ToolCallRecord::success(&call, "2")]),
            Message::tool_summary(&[ToolCallRecord::success(&call, "2")]),
        ];
        let tools = translate(&[ToolDefinition::new("calculator", "math")]);

        let request = ApiRequest {
            model: "granite4:350m",
            messages: messages.iter().map(message_to_api).collect(),
            tools: &tools,
            stream: false,
            options: Some(ApiOptions { temperature: 0.5 }),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["messages"][1]["role"], "assistant");
        assert_eq!(
            value["messages"][1]["tool_calls"][0]["function"]["arguments"]["expression"],
            "1+1"
        );
        assert_eq!(value["messages"][2]["role"], "tool");
        assert_eq!(value["messages"][2]["content"], "Tool 'calculator' result: 2");
        assert!(value["messages"][0].get("tool_calls").is_none());
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["options"]["temperature"], 0.5);
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn tool_less_request_omits_tools() {
        let request = ApiRequest {
            model: "m",
            messages: Vec::new(),
            tools: &[],
            stream: false,
            options: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("options").is_none());
    }

    #[test]
    fn builder_validates_host() {
        let backend = OllamaBackend::builder("http://localhost:11434/").build().unwrap();
        assert_eq!(backend.host(), "http://localhost:11434");
        assert_eq!(backend.to_string(), "ollama(http://localhost:11434)");

        assert!(OllamaBackend::builder("localhost:11434").build().is_err());
    }

    #[tokio::test]
    async fn unreachable_backend_degrades() {
        // Port 9 (discard) is closed on test hosts; the request fails fast.
        let backend = OllamaBackend::builder("http://127.0.0.1:9")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert!(backend.list_models().await.is_empty());
        assert!(!backend.check_connection().await);

        let messages = [Message::user("hi")];
        let response = backend
            .chat(ChatRequest {
                model: "granite4:350m",
                messages: &messages,
                tools: &[],
                stream: false,
            })
            .await;
        assert!(response.failed);
        assert!(response.content.starts_with("Error communicating with Ollama:"));
    }
}
