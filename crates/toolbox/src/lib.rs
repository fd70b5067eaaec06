//! Builtin tools served in-process.
//!
//! [`BuiltinServer`] implements [`mcp::ToolServer`] directly, so a chat can
//! use tools without spawning a tool server process.

pub mod calculator;
mod lookup;
mod server;

pub use calculator::{CalcError, Number, calculate, evaluate};
pub use lookup::{search, weather};
pub use server::BuiltinServer;
