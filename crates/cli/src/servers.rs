//! Tool servers as configured: a child process or the in-process builtin.

use mcp::{Connection, ToolDefinition, ToolResult, ToolServer};
use serde_json::{Map, Value};
use toolbox::BuiltinServer;

use crate::config::ServerEntry;

pub enum AnyServer {
    Process(Connection),
    Builtin(BuiltinServer),
}

impl AnyServer {
    pub fn from_entry(entry: &ServerEntry) -> Self {
        if entry.is_builtin() {
            AnyServer::Builtin(BuiltinServer::new(&entry.name))
        } else {
            AnyServer::Process(Connection::new(entry.server_config()))
        }
    }

    /// Switch to the server described by `entry`.
    ///
    /// A process connection is retargeted in place, so reselecting the same
    /// server keeps its child process and cached tool list.
    pub async fn switch_to(&mut self, entry: &ServerEntry) {
        match self {
            AnyServer::Process(connection) if !entry.is_builtin() => {
                connection.retarget(entry.server_config()).await;
            }
            _ => {
                self.shutdown().await;
                *self = AnyServer::from_entry(entry);
            }
        }
    }

    /// Release the child process, if any.
    pub async fn shutdown(&mut self) {
        if let AnyServer::Process(connection) = self {
            connection.disconnect().await;
        }
    }
}

impl ToolServer for AnyServer {
    fn identity(&self) -> &str {
        match self {
            AnyServer::Process(s) => s.identity(),
            AnyServer::Builtin(s) => s.identity(),
        }
    }

    async fn connect(&mut self) -> mcp::Result<()> {
        match self {
            AnyServer::Process(s) => s.connect().await,
            AnyServer::Builtin(s) => s.connect().await,
        }
    }

    async fn list_tools(&mut self) -> mcp::Result<Vec<ToolDefinition>> {
        match self {
            AnyServer::Process(s) => s.list_tools().await,
            AnyServer::Builtin(s) => s.list_tools().await,
        }
    }

    async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> ToolResult {
        match self {
            AnyServer::Process(s) => s.call_tool(name, arguments).await,
            AnyServer::Builtin(s) => s.call_tool(name, arguments).await,
        }
    }

    async fn check_health(&mut self) -> bool {
        match self {
            AnyServer::Process(s) => s.check_health().await,
            AnyServer::Builtin(s) => s.check_health().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn builtin_entry_serves_in_process() {
        let config = Config::default();
        let mut server = AnyServer::from_entry(config.default_server().unwrap());
        assert!(matches!(server, AnyServer::Builtin(_)));
        assert_eq!(server.identity(), "builtin");
        assert_eq!(server.list_tools().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_script_degrades() {
        let config = Config::parse(
            r#"
            [[tools.servers]]
            name = "network"
            command = "/nonexistent/network_tools.py"
            "#,
        )
        .unwrap();
        let mut server = AnyServer::from_entry(config.server("network").unwrap());
        assert_eq!(server.identity(), "network");
        assert!(server.list_tools().await.is_err());
        assert!(!server.check_health().await);
        assert!(server.call_tool("ping", Map::new()).await.is_error());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn switching_servers_changes_kind_and_identity() {
        let config = Config::parse(
            r#"
            [[tools.servers]]
            name = "network"
            command = "/nonexistent/network_tools.py"

            [[tools.servers]]
            name = "files"
            command = "/nonexistent/file_tools.py"

            [[tools.servers]]
            name = "builtin"
            builtin = true
            "#,
        )
        .unwrap();
        let mut server = AnyServer::from_entry(config.server("network").unwrap());

        server.switch_to(config.server("files").unwrap()).await;
        match &server {
            AnyServer::Process(connection) => {
                assert_eq!(connection.config().command, "/nonexistent/file_tools.py");
            }
            AnyServer::Builtin(_) => panic!("expected a process server"),
        }
        assert_eq!(server.identity(), "files");

        server.switch_to(config.server("builtin").unwrap()).await;
        assert!(matches!(server, AnyServer::Builtin(_)));
        assert_eq!(server.list_tools().await.unwrap().len(), 3);

        server.switch_to(config.server("network").unwrap()).await;
        assert!(matches!(server, AnyServer::Process(_)));
        assert_eq!(server.identity(), "network");
    }
}
