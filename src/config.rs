//! Configuration module for the chat-gate server and client.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::session::SessionPolicy;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "chat-gate")]
#[command(version = "0.1.0")]
#[command(about = "A one-message-per-connection chat server", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Which role this process plays.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the server accept loop
    Serve(ServeArgs),
    /// Run the interactive chat client
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host name or address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum number of pending connections to queue
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Shared-secret password clients must present
    #[arg(long)]
    pub password: Option<String>,

    /// Phrase that stops the server once authenticated
    #[arg(long)]
    pub shutdown_phrase: Option<String>,

    /// Whether authentication survives across connections
    #[arg(long, value_enum)]
    pub session_policy: Option<SessionPolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server host to connect to
    #[arg(long)]
    pub host: Option<String>,

    /// Server port to connect to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Input line that ends the chat loop
    #[arg(long)]
    pub end_command: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub net: NetConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Address-related configuration
#[derive(Debug, Deserialize)]
pub struct NetConfig {
    /// Host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum pending-connection backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
        }
    }
}

/// Authentication gate configuration
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Shared-secret password
    #[serde(default = "default_password")]
    pub password: String,
    /// Phrase that stops the server
    #[serde(default = "default_shutdown_phrase")]
    pub shutdown_phrase: String,
    /// Whether authentication survives across connections
    #[serde(default = "default_session_policy")]
    pub session_policy: SessionPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: default_password(),
            shutdown_phrase: default_shutdown_phrase(),
            session_policy: default_session_policy(),
        }
    }
}

/// Chat client configuration
#[derive(Debug, Deserialize, Default)]
pub struct ChatConfig {
    /// Input line that ends the chat loop; empty means an empty line
    #[serde(default)]
    pub end_command: String,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The local machine's resolvable name, looked up once at config
/// resolution. Falls back to loopback if the lookup fails.
fn default_host() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn default_port() -> u16 {
    80
}

fn default_backlog() -> i32 {
    5
}

fn default_password() -> String {
    "password1".to_string()
}

fn default_shutdown_phrase() -> String {
    "asdf".to_string()
}

fn default_session_policy() -> SessionPolicy {
    SessionPolicy::ProcessWide
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which entry point to run after configuration is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Serve,
    Chat,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backlog: i32,
    pub password: String,
    pub shutdown_phrase: String,
    pub session_policy: SessionPolicy,
    pub end_command: String,
    pub log_level: String,
}

impl Config {
    /// Resolve CLI args and the optional TOML file into a final config.
    /// CLI arguments take precedence over TOML file values.
    pub fn resolve(cli: CliArgs) -> Result<(Role, Self), ConfigError> {
        match cli.command {
            Command::Serve(args) => Ok((Role::Serve, Self::from_serve(args)?)),
            Command::Chat(args) => Ok((Role::Chat, Self::from_chat(args)?)),
        }
    }

    fn from_serve(args: ServeArgs) -> Result<Self, ConfigError> {
        let file = load_toml(args.config.as_deref())?;

        Ok(Config {
            host: args.host.unwrap_or(file.net.host),
            port: args.port.unwrap_or(file.net.port),
            backlog: args.backlog.unwrap_or(file.net.backlog),
            password: args.password.unwrap_or(file.auth.password),
            shutdown_phrase: args.shutdown_phrase.unwrap_or(file.auth.shutdown_phrase),
            session_policy: args.session_policy.unwrap_or(file.auth.session_policy),
            end_command: file.chat.end_command,
            log_level: merge_log_level(args.log_level, file.logging.level),
        })
    }

    fn from_chat(args: ChatArgs) -> Result<Self, ConfigError> {
        let file = load_toml(args.config.as_deref())?;

        Ok(Config {
            host: args.host.unwrap_or(file.net.host),
            port: args.port.unwrap_or(file.net.port),
            backlog: file.net.backlog,
            password: file.auth.password,
            shutdown_phrase: file.auth.shutdown_phrase,
            session_policy: file.auth.session_policy,
            end_command: args.end_command.unwrap_or(file.chat.end_command),
            log_level: merge_log_level(args.log_level, file.logging.level),
        })
    }
}

fn load_toml(path: Option<&Path>) -> Result<TomlConfig, ConfigError> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
            toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(path.to_path_buf(), e))
        }
        None => Ok(TomlConfig::default()),
    }
}

fn merge_log_level(cli: String, file: String) -> String {
    if cli != "info" {
        cli
    } else {
        file
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
