//! Tool server capability trait.

use serde_json::{Map, Value};
use std::future::Future;

use crate::{Result, ToolDefinition, ToolResult};

/// Capability interface for a source of callable tools.
///
/// This is the boundary between the orchestration loop and tool processes.
/// Implementations own their transport and may reconnect internally.
pub trait ToolServer: Send {
    /// Stable identity of the server (its configured name).
    fn identity(&self) -> &str;

    /// Establish the transport.
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Discover tools. An empty list is a valid result.
    fn list_tools(&mut self) -> impl Future<Output = Result<Vec<ToolDefinition>>> + Send;

    /// Invoke one tool. Faults are reported as `status=error`, never raised.
    fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = ToolResult> + Send;

    /// Cheap liveness probe.
    fn check_health(&mut self) -> impl Future<Output = bool> + Send;
}
