//! Configuration module for the fingerd binary.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::directory::UserEntry;

/// Command-line arguments for the finger server
#[derive(Parser, Debug)]
#[command(name = "fingerd")]
#[command(author = "fingerd authors")]
#[command(version = "0.1.0")]
#[command(about = "An RFC 1288 finger server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:79 or :7979)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Seconds allowed for reading the query (0 = no deadline)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Seconds allowed for writing the reply (0 = no deadline)
    #[arg(long)]
    pub write_timeout: Option<u64>,

    /// Maximum bytes read while looking for the end of the query (0 = unbounded)
    #[arg(short = 'm', long)]
    pub max_query_bytes: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Read deadline in seconds
    #[serde(default = "default_timeout")]
    pub read_timeout: u64,
    /// Write deadline in seconds
    #[serde(default = "default_timeout")]
    pub write_timeout: u64,
    /// Query size cap in bytes
    #[serde(default = "default_max_query_bytes")]
    pub max_query_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            read_timeout: default_timeout(),
            write_timeout: default_timeout(),
            max_query_bytes: default_max_query_bytes(),
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

fn default_listen() -> String {
    fingerd::server::DEFAULT_ADDR.to_string()
}

fn default_timeout() -> u64 {
    fingerd::server::DEFAULT_TIMEOUT.as_secs()
}

fn default_max_query_bytes() -> usize {
    fingerd::server::DEFAULT_MAX_QUERY_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_query_bytes: usize,
    pub log_level: String,
    pub users: Vec<UserEntry>,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Merge CLI args over the TOML file they name, if any.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            read_timeout: Duration::from_secs(
                cli.read_timeout.unwrap_or(toml_config.server.read_timeout),
            ),
            write_timeout: Duration::from_secs(
                cli.write_timeout.unwrap_or(toml_config.server.write_timeout),
            ),
            max_query_bytes: cli
                .max_query_bytes
                .unwrap_or(toml_config.server.max_query_bytes),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
            users: toml_config.users,
        })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:79");
        assert_eq!(config.server.read_timeout, 300);
        assert_eq!(config.server.write_timeout, 300);
        assert_eq!(config.server.max_query_bytes, 4096);
        assert!(config.users.is_empty());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = ":7979"
            read_timeout = 10
            max_query_bytes = 512

            [logging]
            level = "debug"

            [[users]]
            name = "alice"
            full_name = "Alice Liddell"
            plan = "Down the rabbit hole."

            [[users]]
            name = "bob"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, ":7979");
        assert_eq!(config.server.read_timeout, 10);
        assert_eq!(config.server.write_timeout, 300);
        assert_eq!(config.server.max_query_bytes, 512);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users[0].full_name, "Alice Liddell");
        assert_eq!(config.users[1].plan, None);
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = CliArgs::parse_from([
            "fingerd",
            "--listen",
            "127.0.0.1:7979",
            "--read-timeout",
            "0",
            "-m",
            "64",
            "--log-level",
            "debug",
        ]);

        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.listen, "127.0.0.1:7979");
        assert_eq!(config.read_timeout, Duration::ZERO);
        assert_eq!(config.write_timeout, Duration::from_secs(300));
        assert_eq!(config.max_query_bytes, 64);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_missing_config_file() {
        let cli = CliArgs::parse_from(["fingerd", "-c", "/nonexistent/fingerd.toml"]);
        let err = Config::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
        assert!(err.to_string().contains("/nonexistent/fingerd.toml"));
    }
}
