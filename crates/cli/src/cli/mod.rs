pub mod chat;
pub mod config;
pub mod history;
pub mod realtime;
pub mod send;
pub mod tools;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use lc_domain::config::Config;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LC_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "localchat.toml";

/// localchat: chat with an OpenAI-compatible model, with MCP tools.
#[derive(Debug, Parser)]
#[command(name = "localchat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat (default when no subcommand is given).
    Chat,
    /// Send a single message and print the reply.
    Send {
        /// The message to send.
        message: String,
        /// Print the turn outcome as JSON instead of streaming text.
        #[arg(long)]
        json: bool,
    },
    /// Print the stored conversation.
    History {
        #[arg(long)]
        json: bool,
    },
    /// Delete every stored message.
    Clear,
    /// List the tools offered by the MCP server.
    Tools,
    /// Print the realtime session request and the `session.update` event
    /// advertising the MCP tools.
    Realtime,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `LC_CONFIG` (or `localchat.toml`). A
/// missing file means defaults. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &str) -> anyhow::Result<Config> {
    if !Path::new(path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    toml::from_str(&raw).with_context(|| format!("parsing {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.store.path, "localchat.db");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm]\nmodel = \"local-model\"\n\n[mcp]\nsse_url = \"\"").unwrap();

        let config = load_config_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.llm.model, "local-model");
        assert!(!config.mcp.is_enabled());
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm\nmodel =").unwrap();

        let path = file.path().to_str().unwrap().to_owned();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains(&path));
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["localchat", "send", "hello", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Send { ref message, json: true }) if message == "hello"
        ));

        let cli = Cli::try_parse_from(["localchat", "config", "validate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Validate))));

        let cli = Cli::try_parse_from(["localchat", "realtime"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Realtime)));

        let cli = Cli::try_parse_from(["localchat"]).unwrap();
        assert!(cli.command.is_none());
    }
}
