//! Tool server connections over MCP (Model Context Protocol).
//!
//! This crate owns the process side of tool calling: spawning a tool server,
//! discovering its tools, invoking them and probing liveness. The protocol
//! itself is provided by the rmcp SDK over the child's stdio.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Connection, ServerConfig, ToolServer};
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::new("tools", "servers/tools.py");
//! let mut server = Connection::new(config);
//!
//! for tool in server.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("expression".into(), "840*0.25".into());
//! let result = server.call_tool("calculator", args).await;
//! println!("{:?}: {}", result.status, result.payload);
//! # Ok(())
//! # }
//! ```

mod error;
mod server;
mod tool_server;
mod types;

pub use error::{Error, Result};
pub use server::{Connection, ConnectionState, DEFAULT_TIMEOUT, HEALTH_TIMEOUT, ServerConfig};
pub use tool_server::ToolServer;
pub use types::{ToolDefinition, ToolResult, ToolStatus};
