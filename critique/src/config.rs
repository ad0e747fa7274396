use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::SearchMode;

/// Minimum length of the cookie signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 64;

#[derive(Debug, Parser)]
#[command(name = "critique", version, about = "Small movie-review web service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(long, global = true, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, short = 'd', global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    #[arg(long, global = true, value_name = "DURATION")]
    pub session_ttl: Option<String>,

    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Drop and recreate the `user` and `film` tables.
    InitDb,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub command: Command,
    pub bind: SocketAddr,
    pub database: PathBuf,
    pub secret_key: Option<String>,
    pub session_ttl: Duration,
    pub search_mode: SearchMode,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid boolean value for env var {key}: {value}")]
    InvalidEnvBool { key: String, value: String },
    #[error("invalid session ttl {value}: {source}")]
    InvalidTtl {
        value: String,
        source: humantime::DurationError,
    },
    #[error("secret key must be at least {min} bytes, got {len}", min = MIN_SECRET_LEN)]
    SecretTooShort { len: usize },
}

/// Settings taken from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    /// `CRITIQUE_SECRET_KEY`
    pub secret_key: Option<String>,
    /// `CRITIQUE_SEARCH_CASE_SENSITIVE`
    pub search_case_sensitive: Option<bool>,
}

impl EnvOverrides {
    pub fn from_process() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: std::env::var("CRITIQUE_SECRET_KEY").ok(),
            search_case_sensitive: read_env_bool("CRITIQUE_SEARCH_CASE_SENSITIVE")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    database: Option<PathBuf>,
    secret_key: Option<String>,
    session_ttl: Option<String>,
    search_case_sensitive: Option<bool>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Self::from_sources(cli, EnvOverrides::from_process()?)
    }

    /// Layer CLI flags over the environment, the config file and defaults.
    pub fn from_sources(cli: Cli, env: EnvOverrides) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;

        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 5000)));
        let database = cli
            .database
            .or(from_file.database)
            .unwrap_or_else(|| PathBuf::from("./instance/critique.sqlite"));
        let session_ttl = parse_ttl(
            cli.session_ttl
                .or(from_file.session_ttl)
                .as_deref()
                .unwrap_or("24h"),
        )?;

        let secret_key = env.secret_key.or(from_file.secret_key);
        if let Some(secret) = &secret_key {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::SecretTooShort { len: secret.len() });
            }
        }

        let search_mode = if env
            .search_case_sensitive
            .or(from_file.search_case_sensitive)
            .unwrap_or(true)
        {
            SearchMode::CaseSensitive
        } else {
            SearchMode::CaseInsensitive
        };

        Ok(Self {
            command: cli.command.unwrap_or(Command::Serve),
            bind,
            database,
            secret_key,
            session_ttl,
            search_mode,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn parse_ttl(raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|source| ConfigError::InvalidTtl {
        value: String::from(raw),
        source,
    })
}

fn read_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => parse_bool_value(key, &value).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from("<non-unicode>"),
        }),
    }
}

fn parse_bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from(raw),
        }),
    }
}
