//! Tender runtime: chat sessions, the Ollama backend, and the tool-calling
//! turn loop.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **ChatSession**: history plus the per-session model, tool toggle, and
//!   selected tool server.
//! - **Backend**: a trait abstracting the chat model. [`OllamaBackend`] talks
//!   to a local Ollama daemon.
//! - **Orchestrator**: runs one user turn, discovering tools from an attached
//!   [`mcp::ToolServer`] and feeding results back to the model.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Connection, ServerConfig};
//! use runtime::{ChatSession, OllamaBackend, Orchestrator};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = OllamaBackend::builder(runtime::DEFAULT_HOST).build()?;
//! let server = Connection::new(ServerConfig::new("tools", "./tools_server.py"));
//! let mut orchestrator = Orchestrator::new(backend).with_server(server);
//!
//! let mut session = ChatSession::new("granite4:350m").with_server(Some("tools".into()));
//! let turn = orchestrator.run_turn(&mut session, "What's 25% of 840?").await;
//! println!("{}", turn.reply);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod model;
mod orchestrator;
mod providers;
pub mod schema;
mod session;

pub use error::{Error, Result};

pub use model::{
    Backend, ChatRequest, ChatResponse, Message, ModelError, Role, ToolCall, ToolCallRecord,
    extract_tool_calls,
};

pub use providers::{DEFAULT_HOST, OllamaBackend, OllamaBackendBuilder, parse_model_list};

pub use schema::{FunctionTool, ValidationError, translate, validate_arguments};

pub use orchestrator::{Orchestrator, Turn};

pub use session::{ChatSession, SessionId};
