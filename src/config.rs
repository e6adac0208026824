//! Configuration module for socket-responder.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the responder
#[derive(Parser, Debug)]
#[command(name = "socket-responder")]
#[command(author = "socket-responder authors")]
#[command(version = "0.1.0")]
#[command(about = "A minimal HTTP responder over raw TCP sockets", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to (e.g., localhost, 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listen backlog for pending connections
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Connection handling mode
    #[arg(long, value_enum)]
    pub mode: Option<ServeMode>,

    /// Maximum number of connections handled at once (concurrent mode)
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Size of the single read performed per connection, in bytes
    #[arg(long)]
    pub read_buffer_size: Option<usize>,

    /// Give up on a silent client after this many milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Handler producing response bodies
    #[arg(long, value_enum)]
    pub handler: Option<HandlerKind>,

    /// Upper bound on the `rolls` query parameter
    #[arg(long)]
    pub max_rolls: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// How accepted connections are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServeMode {
    /// Handle each connection inline in the accept loop
    Sequential,
    /// Spawn a task per connection, bounded by `max_connections`
    Concurrent,
}

/// Which handler produces response bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    /// Reply with the request line
    Echo,
    /// Roll dice, plain text
    Dice,
    /// Roll dice, HTML list
    DiceHtml,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub handler: HandlerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    #[serde(default = "default_mode")]
    pub mode: ServeMode,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            mode: default_mode(),
            max_connections: default_max_connections(),
        }
    }
}

/// Per-connection I/O configuration
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Unset means a read blocks until data or EOF
    pub read_timeout_ms: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: default_read_buffer_size(),
            read_timeout_ms: None,
        }
    }
}

/// Handler selection
#[derive(Debug, Deserialize)]
pub struct HandlerConfig {
    #[serde(default = "default_handler_kind")]
    pub kind: HandlerKind,
    #[serde(default = "default_max_rolls")]
    pub max_rolls: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            kind: default_handler_kind(),
            max_rolls: default_max_rolls(),
        }
    }
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

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3003
}

fn default_backlog() -> u32 {
    128
}

fn default_mode() -> ServeMode {
    ServeMode::Concurrent
}

fn default_max_connections() -> usize {
    1024
}

fn default_read_buffer_size() -> usize {
    1024
}

fn default_handler_kind() -> HandlerKind {
    HandlerKind::Dice
}

fn default_max_rolls() -> u32 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
    pub mode: ServeMode,
    pub max_connections: usize,
    pub read_buffer_size: usize,
    pub read_timeout_ms: Option<u64>,
    pub handler: HandlerKind,
    pub max_rolls: u32,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over TOML values and validate the result.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            mode: cli.mode.unwrap_or(toml_config.server.mode),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            read_buffer_size: cli
                .read_buffer_size
                .unwrap_or(toml_config.connection.read_buffer_size),
            read_timeout_ms: cli
                .read_timeout_ms
                .or(toml_config.connection.read_timeout_ms),
            handler: cli.handler.unwrap_or(toml_config.handler.kind),
            max_rolls: cli.max_rolls.unwrap_or(toml_config.handler.max_rolls),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.read_buffer_size == 0 {
            return Err(ConfigError::Invalid("read_buffer_size must be at least 1"));
        }
        if config.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be at least 1"));
        }
        // Semaphore permits are acquired as a u32 batch on shutdown.
        if config.max_connections > u32::MAX as usize {
            return Err(ConfigError::Invalid("max_connections is too large"));
        }

        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str),
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
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
