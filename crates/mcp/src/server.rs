//! Tool server connection lifecycle (spawn, discover, call, probe).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, ClientRequest, PingRequest},
    service::{RoleClient, RunningService},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::tool_server::ToolServer;
use crate::types::{ToolDefinition, ToolResult};

/// Default timeout for handshake, discovery and tool calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the liveness probe.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a tool server process.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    /// Program to run, or a script path launched through its interpreter.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub description: String,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            description: String::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Resolve the program and arguments to spawn.
    ///
    /// Scripts (`.py`, `.js`, `.mjs`) run through their interpreter. Anything
    /// that looks like a path must exist.
    pub fn launch_target(&self) -> Result<(String, Vec<String>)> {
        let command = self.command.trim();
        if command.is_empty() {
            return Err(Error::TargetMissing(command.into()));
        }

        let path = Path::new(command);
        let interpreter = match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => Some("python3"),
            Some("js" | "mjs") => Some("node"),
            _ => None,
        };

        let is_path = interpreter.is_some() || command.contains('/') || command.contains('\\');
        if is_path && !path.exists() {
            return Err(Error::TargetMissing(path.to_path_buf()));
        }

        Ok(match interpreter {
            Some(program) => {
                let mut args = vec![command.to_string()];
                args.extend(self.args.iter().cloned());
                (program.to_string(), args)
            }
            None => (command.to_string(), self.args.clone()),
        })
    }
}

/// Observable lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Failed,
}

enum Transport {
    Disconnected,
    Connected(RunningService<RoleClient, ()>),
    Failed(String),
}

/// A connection to one tool server process.
///
/// The child process is killed when the connection is dropped.
pub struct Connection {
    config: ServerConfig,
    transport: Transport,
    tools: Option<Vec<ToolDefinition>>,
    timeout: Duration,
}

impl Connection {
    /// Create a disconnected handle. Nothing is spawned until first use.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            transport: Transport::Disconnected,
            tools: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        match self.transport {
            Transport::Disconnected => ConnectionState::Disconnected,
            Transport::Connected(_) => ConnectionState::Connected,
            Transport::Failed(_) => ConnectionState::Failed,
        }
    }

    /// Reason for the last failure, if the connection is in the failed state.
    pub fn failure(&self) -> Option<&str> {
        match &self.transport {
            Transport::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Point this connection at a (possibly different) server.
    ///
    /// Any change drops the transport and the cached tool list.
    pub async fn retarget(&mut self, config: ServerConfig) {
        if config != self.config {
            self.disconnect().await;
            self.tools = None;
        }
        self.config = config;
    }

    /// Shut down the server process.
    pub async fn disconnect(&mut self) {
        if let Transport::Connected(service) =
            std::mem::replace(&mut self.transport, Transport::Disconnected)
        {
            info!(server = %self.config.name, "disconnecting tool server");
            if let Err(e) = service.cancel().await {
                debug!(server = %self.config.name, error = %e, "tool server shutdown");
            }
        }
    }

    // --- Internal methods ---

    async fn spawn(&self) -> Result<RunningService<RoleClient, ()>> {
        let (program, args) = self.config.launch_target()?;
        let env = self.config.env.clone();

        debug!(server = %self.config.name, %program, ?args, "spawning tool server");
        let transport = TokioChildProcess::new(Command::new(&program).configure(|cmd| {
            cmd.args(&args).envs(&env).kill_on_drop(true);
        }))
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::TargetMissing(program.clone().into()),
            _ => Error::Spawn(e),
        })?;

        time::timeout(self.timeout, ().serve(transport))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(|e| Error::Handshake(e.to_string()))
    }

    async fn service(&mut self) -> Result<&RunningService<RoleClient, ()>> {
        if self.state() != ConnectionState::Connected {
            self.connect().await?;
        }
        match &self.transport {
            Transport::Connected(service) => Ok(service),
            _ => Err(Error::NotConnected),
        }
    }

    /// Drop a dead transport so the next operation reconnects.
    fn reset_transport(&mut self) {
        warn!(server = %self.config.name, "tool server transport closed, reconnecting");
        self.transport = Transport::Disconnected;
    }

    fn mark_failed(&mut self, err: &Error) {
        if matches!(err, Error::Timeout(_)) {
            self.transport = Transport::Failed(err.to_string());
        }
    }

    async fn fetch_tools(&mut self) -> Result<Vec<ToolDefinition>> {
        let timeout = self.timeout;
        let service = self.service().await?;
        let response = time::timeout(timeout, service.list_tools(Default::default()))
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        Ok(response.tools.into_iter().map(ToolDefinition::from).collect())
    }

    async fn invoke(&mut self, name: &str, arguments: Map<String, Value>) -> Result<ToolResult> {
        let timeout = self.timeout;
        let service = self.service().await?;
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments: Some(arguments),
            task: None,
        };

        let result = time::timeout(timeout, service.call_tool(params))
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        Ok(ToolResult::from(result))
    }

    async fn ping(&mut self) -> Result<()> {
        let service = self.service().await?;
        let request = ClientRequest::PingRequest(PingRequest::default());
        time::timeout(HEALTH_TIMEOUT, service.send_request(request))
            .await
            .map_err(|_| Error::Timeout(HEALTH_TIMEOUT))??;
        Ok(())
    }
}

impl ToolServer for Connection {
    fn identity(&self) -> &str {
        &self.config.name
    }

    async fn connect(&mut self) -> Result<()> {
        if let Transport::Connected(_) = self.transport {
            return Ok(());
        }

        match self.spawn().await {
            Ok(service) => {
                info!(server = %self.config.name, "connected to tool server");
                self.transport = Transport::Connected(service);
                Ok(())
            }
            Err(e) => {
                warn!(server = %self.config.name, error = %e, "tool server connection failed");
                self.transport = Transport::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>> {
        if let Some(tools) = &self.tools {
            debug!(server = %self.config.name, count = tools.len(), "using cached tool list");
            return Ok(tools.clone());
        }

        let mut result = self.fetch_tools().await;
        if matches!(&result, Err(e) if e.is_transport_closed()) {
            self.reset_transport();
            result = self.fetch_tools().await;
        }

        match result {
            Ok(tools) => {
                for tool in &tools {
                    debug!(server = %self.config.name, tool = %tool.name, "found tool");
                }
                info!(server = %self.config.name, count = tools.len(), "discovered tools");
                self.tools = Some(tools.clone());
                Ok(tools)
            }
            Err(e) => {
                warn!(server = %self.config.name, error = %e, "error listing tools");
                self.mark_failed(&e);
                Err(e)
            }
        }
    }

    async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> ToolResult {
        info!(server = %self.config.name, tool = name, "calling tool");

        let mut result = self.invoke(name, arguments.clone()).await;
        if matches!(&result, Err(e) if e.is_transport_closed()) {
            self.reset_transport();
            result = self.invoke(name, arguments).await;
        }

        match result {
            Ok(outcome) => {
                if outcome.is_error() {
                    warn!(tool = name, payload = %outcome.payload, "tool reported an error");
                } else {
                    debug!(tool = name, payload = %outcome.payload, "tool result");
                }
                outcome
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                self.mark_failed(&e);
                ToolResult::error(format!("Error calling tool '{name}': {e}"))
            }
        }
    }

    async fn check_health(&mut self) -> bool {
        let mut result = self.ping().await;
        if matches!(&result, Err(e) if e.is_transport_closed()) {
            self.reset_transport();
            result = self.ping().await;
        }

        match result {
            Ok(()) => {
                debug!(server = %self.config.name, "tool server health check passed");
                true
            }
            Err(e) => {
                warn!(server = %self.config.name, error = %e, "tool server health check failed");
                false
            }
        }
    }
}
