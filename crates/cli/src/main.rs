mod config;
mod error;
mod servers;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mcp::ToolServer;
use runtime::{Backend, ChatSession, OllamaBackend, Orchestrator, ToolCallRecord};
use tracing::{Instrument, info_span};
use tracing_subscriber::EnvFilter;

use config::{Config, ServerEntry};
use error::{Error, Result};
use servers::AnyServer;

const CONFIG_FILE: &str = "tender.toml";
const DEFAULT_LOG_FILTER: &str = "tender=info,runtime=info,mcp=info";

#[derive(Parser)]
#[command(name = "tender")]
#[command(about = "Chat with a local Ollama model that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Override the configured model
    #[arg(short, long)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Tool server to use (defaults to tools.default_server)
        #[arg(short, long)]
        server: Option<String>,
        /// Start with tools disabled
        #[arg(long)]
        no_tools: bool,
    },
    /// List models available on the Ollama host
    Models,
    /// Check the backend and every configured tool server
    Status,
    /// List the tools a server exposes
    Tools {
        /// Only this server
        #[arg(short, long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(model) = cli.model {
        config.backend.model = model;
    }

    match cli.command {
        Some(Commands::Chat { server, no_tools }) => cmd_chat(&config, server, !no_tools).await,
        None => cmd_chat(&config, None, true).await,
        Some(Commands::Models) => cmd_models(&config).await,
        Some(Commands::Status) => cmd_status(&config).await,
        Some(Commands::Tools { server }) => cmd_tools(&config, server.as_deref()).await,
    }
}

fn build_backend(config: &Config) -> Result<OllamaBackend> {
    let mut builder = OllamaBackend::builder(&config.backend.host);
    if let Some(temperature) = config.backend.temperature {
        builder = builder.temperature(temperature);
    }
    Ok(builder.build()?)
}

fn lookup_server<'a>(config: &'a Config, name: &str) -> Result<&'a ServerEntry> {
    config.server(name).ok_or_else(|| Error::UnknownServer {
        name: name.to_string(),
        known: config.server_names().map(String::from).collect(),
    })
}

async fn cmd_chat(config: &Config, server: Option<String>, use_tools: bool) -> Result<()> {
    println!("tender v{}", env!("CARGO_PKG_VERSION"));

    let backend = build_backend(config)?;
    if !backend.check_connection().await {
        return Err(Error::BackendUnreachable {
            host: backend.host().to_string(),
        });
    }

    let selected = match server {
        Some(name) => Some(lookup_server(config, &name)?),
        None => config.default_server(),
    };

    let mut session = ChatSession::new(&config.backend.model)
        .with_tools(use_tools && config.tools.enabled)
        .with_server(selected.map(|entry| entry.name.clone()));
    if let Some(system) = &config.backend.system {
        session = session.with_system(system);
    }

    let models = backend.list_models().await;
    match session.resolve_model(&models) {
        Ok(Some(requested)) => println!(
            "Model '{requested}' not available, using '{}'",
            session.model()
        ),
        Ok(None) => {}
        Err(e) => eprintln!("Warning: {e}. Pull one with `ollama pull <model>`."),
    }

    let mut orchestrator = Orchestrator::new(backend);
    if let Some(entry) = selected {
        orchestrator.attach(AnyServer::from_entry(entry));
    }

    println!("Session ID: {}", session.id);
    print_status(&session);
    println!("Type /help for commands, 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        if let Some(command) = input.strip_prefix('/') {
            handle_command(command, config, &mut session, &mut orchestrator).await;
            continue;
        }

        let span = info_span!("turn", session = %session.id);
        let turn = orchestrator
            .run_turn(&mut session, input)
            .instrument(span)
            .await;

        println!("\n{}", turn.reply);
        for record in &turn.records {
            println!("  {}", format_record(record));
        }
        println!();
    }

    if let Some(mut server) = orchestrator.detach() {
        server.shutdown().await;
    }
    println!("\nSession ended.");
    Ok(())
}

async fn handle_command(
    command: &str,
    config: &Config,
    session: &mut ChatSession,
    orchestrator: &mut Orchestrator<OllamaBackend, AnyServer>,
) {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match (name, arg) {
        ("clear", _) => {
            session.clear();
            println!("History cleared.");
        }
        ("tools", "on") => {
            session.set_use_tools(true);
            println!("Tools enabled.");
        }
        ("tools", "off") => {
            session.set_use_tools(false);
            println!("Tools disabled.");
        }
        ("server", "") => println!("Usage: /server <name>"),
        ("server", name) => match lookup_server(config, name) {
            Ok(entry) => {
                match orchestrator.server_mut() {
                    Some(server) => server.switch_to(entry).await,
                    None => {
                        orchestrator.attach(AnyServer::from_entry(entry));
                    }
                }
                session.select_server(Some(entry.name.clone()));
                println!("Using tool server '{}'.", entry.name);
            }
            Err(e) => println!("{e}"),
        },
        ("model", "") => println!("Usage: /model <name>"),
        ("model", model) => {
            let models = orchestrator.backend().list_models().await;
            if models.iter().any(|m| m == model) {
                session.set_model(model);
                println!("Using model '{model}'.");
            } else {
                println!("Model '{model}' not available. Available: {}", models.join(", "));
            }
        }
        ("status", _) => print_status(session),
        ("help", _) => {
            println!("/clear            forget the conversation");
            println!("/tools on|off     toggle tool use");
            println!("/server <name>    switch tool server");
            println!("/model <name>     switch model");
            println!("/status           show session settings");
            println!("quit              exit");
        }
        _ => println!("Unknown command '/{command}'. Try /help."),
    }
}

fn print_status(session: &ChatSession) {
    println!("Model: {}", session.model());
    let tools = match (session.use_tools(), session.server()) {
        (true, Some(server)) => format!("on (server '{server}')"),
        (true, None) => "on (no server selected)".to_string(),
        (false, _) => "off".to_string(),
    };
    println!("Tools: {tools}");
    println!("Messages: {}", session.messages().len());
}

fn format_record(record: &ToolCallRecord) -> String {
    let args = serde_json::Value::Object(record.arguments.clone());
    let outcome = match (record.is_error(), record.result.is_empty()) {
        (false, _) => record.result.clone(),
        (true, true) => "unavailable".to_string(),
        (true, false) => format!("error: {}", record.result),
    };
    format!("{}({args}) → {outcome}", record.tool_name)
}

async fn cmd_models(config: &Config) -> Result<()> {
    let backend = build_backend(config)?;
    if !backend.check_connection().await {
        return Err(Error::BackendUnreachable {
            host: backend.host().to_string(),
        });
    }

    let models = backend.list_models().await;
    if models.is_empty() {
        println!("No models installed. Pull one with `ollama pull <model>`.");
        return Ok(());
    }

    for model in models {
        let marker = if model == config.backend.model { "*" } else { " " };
        println!("{marker} {model}");
    }
    Ok(())
}

async fn cmd_status(config: &Config) -> Result<()> {
    let backend = build_backend(config)?;
    let reachable = backend.check_connection().await;
    println!(
        "{:<16}  {:<12}  {}",
        "backend",
        if reachable { "ok" } else { "unreachable" },
        backend
    );

    for entry in &config.tools.servers {
        let mut server = AnyServer::from_entry(entry);
        let healthy = server.check_health().await;
        println!(
            "{:<16}  {:<12}  {}",
            entry.name,
            if healthy { "ok" } else { "unreachable" },
            entry.description
        );
        server.shutdown().await;
    }
    Ok(())
}

async fn cmd_tools(config: &Config, only: Option<&str>) -> Result<()> {
    let entries = match only {
        Some(name) => vec![lookup_server(config, name)?],
        None => config.tools.servers.iter().collect(),
    };

    for entry in entries {
        let mut server = AnyServer::from_entry(entry);
        println!("{}:", entry.name);
        match server.list_tools().await {
            Ok(tools) if tools.is_empty() => println!("  (no tools)"),
            Ok(tools) => {
                for tool in tools {
                    println!("  {:<16}  {}", tool.name, tool.description);
                }
            }
            Err(e) => println!("  unavailable: {e}"),
        }
        server.shutdown().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::ToolStatus;
    use serde_json::json;

    fn record(status: ToolStatus, result: &str) -> ToolCallRecord {
        ToolCallRecord {
            tool_name: "calculator".into(),
            arguments: json!({"expression": "840*0.25"}).as_object().cloned().unwrap(),
            result: result.into(),
            status,
        }
    }

    #[test]
    fn records_print_call_and_outcome() {
        assert_eq!(
            format_record(&record(ToolStatus::Success, "210.0")),
            r#"calculator({"expression":"840*0.25"}) → 210.0"#
        );
        assert_eq!(
            format_record(&record(ToolStatus::Error, "timed out")),
            r#"calculator({"expression":"840*0.25"}) → error: timed out"#
        );
        assert_eq!(
            format_record(&record(ToolStatus::Error, "")),
            r#"calculator({"expression":"840*0.25"}) → unavailable"#
        );
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["tender", "--model", "llama3.2", "tools", "-s", "builtin"])
            .unwrap();
        assert_eq!(cli.model.as_deref(), Some("llama3.2"));
        assert!(matches!(
            cli.command,
            Some(Commands::Tools { server: Some(ref s) }) if s == "builtin"
        ));
    }

    #[test]
    fn unknown_server_lists_known_ones() {
        let config = Config::default();
        let err = lookup_server(&config, "nope").unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"unknown tool server 'nope'. Configured: ["builtin"]"#
        );
    }
}
