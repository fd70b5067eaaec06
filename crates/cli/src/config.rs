//! Configuration loading from tender.toml.

use mcp::ServerConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Identity of the in-process tool server.
pub const BUILTIN_SERVER: &str = "builtin";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Chat backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Ollama base URL.
    #[serde(default = "default_host")]
    pub host: String,

    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,

    /// System prompt sent with every request.
    pub system: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            temperature: default_temperature(),
            system: None,
        }
    }
}

/// Tool server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Whether new sessions start with tools enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Server selected for new sessions. Defaults to the first listed one.
    #[serde(default)]
    pub default_server: Option<String>,

    #[serde(default = "default_servers")]
    pub servers: Vec<ServerEntry>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_server: None,
            servers: default_servers(),
        }
    }
}

/// One `[[tools.servers]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerEntry {
    pub name: String,

    /// Program or script to launch. Unused for builtin servers.
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub description: String,

    /// Serve the builtin tools in-process instead of launching a command.
    #[serde(default)]
    pub builtin: bool,
}

impl ServerEntry {
    pub fn is_builtin(&self) -> bool {
        self.builtin || self.name == BUILTIN_SERVER
    }

    /// Launch configuration for a process-backed server.
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(&self.name, &self.command)
            .with_args(self.args.iter().cloned())
            .with_description(&self.description);
        config.env = self.env.clone();
        config
    }
}

fn default_host() -> String {
    runtime::DEFAULT_HOST.to_string()
}

fn default_model() -> String {
    "granite4:350m".to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.7)
}

fn default_true() -> bool {
    true
}

fn default_servers() -> Vec<ServerEntry> {
    vec![ServerEntry {
        name: BUILTIN_SERVER.to_string(),
        command: String::new(),
        args: Vec::new(),
        env: HashMap::new(),
        description: "Calculator, weather and search tools".to_string(),
        builtin: true,
    }]
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load the file if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            debug!(path = %path.display(), "loading config");
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `TENDER_HOST` and `TENDER_MODEL` overrides.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("TENDER_HOST").filter(|v| !v.trim().is_empty()) {
            self.backend.host = host;
        }
        if let Some(model) = var("TENDER_MODEL").filter(|v| !v.trim().is_empty()) {
            self.backend.model = model;
        }
    }

    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.tools.servers.iter().find(|s| s.name == name)
    }

    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.tools.servers.iter().map(|s| s.name.as_str())
    }

    /// The configured default server, if it is actually listed, or the
    /// first listed server when none is named.
    pub fn default_server(&self) -> Option<&ServerEntry> {
        let Some(name) = self.tools.default_server.as_deref() else {
            return self.tools.servers.first();
        };
        let entry = self.server(name);
        if entry.is_none() {
            warn!(server = name, "default tool server is not configured");
        }
        entry
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.host, "http://localhost:11434");
        assert_eq!(config.backend.model, "granite4:350m");
        assert!(config.tools.enabled);
        let server = config.default_server().unwrap();
        assert!(server.is_builtin());
    }

    #[test]
    fn parses_full_file() {
        let config = Config::parse(
            r#"
            [backend]
            host = "http://gpu-box:11434"
            model = "llama3.2"
            temperature = 0.2
            system = "Be brief."

            [tools]
            enabled = false
            default_server = "network"

            [[tools.servers]]
            name = "network"
            command = "network_tools.py"
            args = ["--verbose"]
            description = "Network diagnostics"

            [[tools.servers]]
            name = "local"
            builtin = true
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.model, "llama3.2");
        assert_eq!(config.backend.temperature, Some(0.2));
        assert_eq!(config.backend.system.as_deref(), Some("Be brief."));
        assert!(!config.tools.enabled);

        let network = config.default_server().unwrap();
        assert!(!network.is_builtin());
        let launch = network.server_config();
        assert_eq!(launch.name, "network");
        assert_eq!(launch.args, vec!["--verbose"]);

        assert!(config.server("local").unwrap().is_builtin());
        assert_eq!(config.server_names().collect::<Vec<_>>(), vec!["network", "local"]);
    }

    #[test]
    fn first_listed_server_is_the_default() {
        let config = Config::parse(
            r#"
            [[tools.servers]]
            name = "network"
            command = "network_tools.py"

            [[tools.servers]]
            name = "files"
            command = "file_tools.py"
            "#,
        )
        .unwrap();
        assert_eq!(config.default_server().map(|s| s.name.as_str()), Some("network"));

        let empty = Config::parse("[tools]\nservers = []").unwrap();
        assert!(empty.default_server().is_none());
    }

    #[test]
    fn unlisted_default_server_is_ignored() {
        let config = Config::parse(
            r#"
            [tools]
            default_server = "missing"
            "#,
        )
        .unwrap();
        assert!(config.default_server().is_none());
    }

    #[test]
    fn env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "TENDER_HOST" => Some("http://other:11434".into()),
            "TENDER_MODEL" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.backend.host, "http://other:11434");
        assert_eq!(config.backend.model, "granite4:350m");
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = Config::parse("[backend\nhost = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
