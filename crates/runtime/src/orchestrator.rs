//! The tool-calling turn loop.
//!
//! A turn makes at most two backend calls: one to let the model answer or
//! request tools, and one to let it answer with the tool results. Tool calls
//! requested in the second response are not executed.

use mcp::{ToolDefinition, ToolServer};
use tracing::{debug, info, warn};

use crate::model::{Backend, ChatRequest, Message, ToolCall, ToolCallRecord, extract_tool_calls};
use crate::schema::{self, validate_arguments};
use crate::session::ChatSession;

/// Outcome of one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// Final assistant text.
    pub reply: String,
    /// Tool calls executed during the turn, in request order.
    pub records: Vec<ToolCallRecord>,
    /// Number of backend calls issued (1 or 2).
    pub backend_calls: usize,
}

/// Drives turns against a backend and an optional tool server.
///
/// The tool server is owned here and reused across turns; it is only used
/// when the session enables tools and selects this server's identity.
pub struct Orchestrator<B, S> {
    backend: B,
    server: Option<S>,
}

impl<B: Backend, S: ToolServer> Orchestrator<B, S> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            server: None,
        }
    }

    pub fn with_server(mut self, server: S) -> Self {
        self.server = Some(server);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn server(&self) -> Option<&S> {
        self.server.as_ref()
    }

    pub fn server_mut(&mut self) -> Option<&mut S> {
        self.server.as_mut()
    }

    /// Replace the tool server, returning the previous one.
    pub fn attach(&mut self, server: S) -> Option<S> {
        self.server.replace(server)
    }

    pub fn detach(&mut self) -> Option<S> {
        self.server.take()
    }

    /// Run one user turn and append it to the session's history.
    ///
    /// Never fails: backend and tool faults end up in the reply or in
    /// error-status records. A turn whose backend call failed is not
    /// appended.
    pub async fn run_turn(&mut self, session: &mut ChatSession, input: &str) -> Turn {
        let Self { backend, server } = self;
        info!(session = %session.id, model = session.model(), "starting turn");

        let mut messages = Vec::with_capacity(session.messages().len() + 4);
        if let Some(system) = session.system() {
            messages.push(Message::system(system));
        }
        messages.extend_from_slice(session.messages());
        let user = Message::user(input);
        messages.push(user.clone());

        let mut active = active_server(server, session);
        let definitions = match active.as_deref_mut() {
            Some(server) => discover(server).await,
            None => Vec::new(),
        };
        if definitions.is_empty() {
            active = None;
        }
        let tools = schema::translate(&definitions);

        let first = backend
            .chat(ChatRequest {
                model: session.model(),
                messages: &messages,
                tools: &tools,
                stream: false,
            })
            .await;

        if first.failed {
            warn!(session = %session.id, "backend call failed, turn not recorded");
            return Turn {
                reply: first.content,
                records: Vec::new(),
                backend_calls: 1,
            };
        }

        let calls = extract_tool_calls(&first);
        if calls.is_empty() {
            debug!(session = %session.id, "no tool calls, answering directly");
            let reply = first.content;
            session.commit_turn(vec![user, Message::assistant(reply.clone())]);
            return Turn {
                reply,
                records: Vec::new(),
                backend_calls: 1,
            };
        }

        info!(session = %session.id, calls = calls.len(), "processing tool calls");
        let mut records = Vec::with_capacity(calls.len());
        for call in &calls {
            let record = match active.as_deref_mut() {
                Some(server) => execute(server, call, &definitions).await,
                None => {
                    warn!(tool = %call.name, "no active tool server, skipping call");
                    ToolCallRecord::unavailable(call)
                }
            };
            records.push(record);
        }

        let assistant = Message::assistant(first.content).with_tool_calls(records.clone());
        let summary = Message::tool_summary(&records);
        messages.push(assistant.clone());
        messages.push(summary.clone());

        let second = backend
            .chat(ChatRequest {
                model: session.model(),
                messages: &messages,
                tools: &tools,
                stream: false,
            })
            .await;

        if !second.tool_calls.is_empty() {
            debug!(
                session = %session.id,
                calls = second.tool_calls.len(),
                "ignoring tool calls in follow-up response"
            );
        }

        let reply = second.content;
        if second.failed {
            warn!(session = %session.id, "follow-up backend call failed, turn not recorded");
            return Turn {
                reply,
                records,
                backend_calls: 2,
            };
        }
        session.commit_turn(vec![user, assistant, summary, Message::assistant(reply.clone())]);

        Turn {
            reply,
            records,
            backend_calls: 2,
        }
    }
}

/// The attached server, if the session wants tools from it.
fn active_server<'a, S: ToolServer>(
    server: &'a mut Option<S>,
    session: &ChatSession,
) -> Option<&'a mut S> {
    if !session.use_tools() {
        return None;
    }
    let selected = session.server()?;
    match server.as_mut() {
        Some(server) if server.identity() == selected => Some(server),
        Some(server) => {
            warn!(
                selected = %selected,
                attached = server.identity(),
                "attached tool server does not match selection"
            );
            None
        }
        None => None,
    }
}

async fn discover<S: ToolServer>(server: &mut S) -> Vec<ToolDefinition> {
    match server.list_tools().await {
        Ok(tools) => {
            info!(server = server.identity(), count = tools.len(), "loaded tools");
            tools
        }
        Err(e) => {
            warn!(
                server = server.identity(),
                error = %e,
                "tool discovery failed, continuing without tools"
            );
            Vec::new()
        }
    }
}

async fn execute<S: ToolServer>(
    server: &mut S,
    call: &ToolCall,
    definitions: &[ToolDefinition],
) -> ToolCallRecord {
    let schema = definitions
        .iter()
        .find(|d| d.name == call.name)
        .and_then(|d| d.parameter_schema.as_ref());

    if let Err(e) = validate_arguments(schema, &call.arguments) {
        warn!(tool = %call.name, error = %e, "rejecting tool call");
        let message = format!("Invalid arguments for tool '{}': {e}", call.name);
        return ToolCallRecord::error(call, message);
    }

    let result = server.call_tool(&call.name, call.arguments.clone()).await;
    ToolCallRecord::from_result(call, result)
}
