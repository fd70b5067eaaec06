//! Conversation types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, ChatRequest, ChatResponse, Message, Role, ToolCall, ToolCallRecord,
    extract_tool_calls,
};
