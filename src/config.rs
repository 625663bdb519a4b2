//! # Service configuration
//!
//! Settings come from command-line flags, optionally layered over a TOML file
//! given with `--config`. Flags that are passed explicitly win over the file.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! bind_address = "127.0.0.1:7003"
//! credentials_file = "/etc/multiuser-authd/tokens"
//! live_reload = true
//! reload_queue_capacity = 5
//! watch_replacements = false
//! log_level = "info"
//! ```

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid bind address '{address}': {reason}")]
    BindAddress { address: String, reason: String },
    #[error("reload queue capacity must be at least 1")]
    ReloadCapacity,
    #[error("max body size must be at least 1 byte")]
    MaxBodyBytes,
    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// `host:port` the HTTP listener binds to.
    pub bind_address: String,
    pub credentials_file: PathBuf,
    /// Reload the credential file when it changes on disk.
    pub live_reload: bool,
    /// Bound of the queue between the file watcher and the reloader.
    pub reload_queue_capacity: usize,
    /// Also reload when the file is replaced by create or rename.
    pub watch_replacements: bool,
    pub max_body_bytes: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            credentials_file: PathBuf::from("./tokens"),
            live_reload: false,
            reload_queue_capacity: 5,
            watch_replacements: false,
            max_body_bytes: 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

fn default_bind_address() -> String {
    "[::]:7003".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        split_host_port(&self.bind_address)?;
        if self.reload_queue_capacity == 0 {
            return Err(ConfigError::ReloadCapacity);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::MaxBodyBytes);
        }
        self.tracing_level()?;
        Ok(())
    }

    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// Address string handed to the listener. An empty host binds the IPv6
    /// wildcard, which also accepts IPv4 on dual-stack hosts.
    pub fn listen_target(&self) -> Result<String, ConfigError> {
        let (host, port) = split_host_port(&self.bind_address)?;
        Ok(match host {
            "" => format!("[::]:{port}"),
            h if h.contains(':') => format!("[{h}]:{port}"),
            h => format!("{h}:{port}"),
        })
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts and an empty host.
/// The port must be numeric; service names and an empty port are rejected.
pub fn split_host_port(address: &str) -> Result<(&str, u16), ConfigError> {
    let invalid = |reason: &str| ConfigError::BindAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("missing ']'"))?;
        let port = tail.strip_prefix(':').ok_or_else(|| invalid("missing port"))?;
        (host, port)
    } else {
        let (host, port) = address.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        if host.contains(':') {
            return Err(invalid("too many colons"));
        }
        (host, port)
    };

    let port = port.parse::<u16>().map_err(|_| invalid("port is not a number in 0-65535"))?;
    Ok((host, port))
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path.display(), e);
            Err(ConfigError::Io(e))
        }
    }
}

/// Command-line flags.
#[derive(Debug, Default, Parser)]
#[command(
    name = "multiuser-authd",
    version,
    about = "Login plugin that checks users against a credential file"
)]
pub struct Cli {
    /// Bind address (host:port)
    #[arg(long = "addr")]
    pub bind_address: Option<String>,

    /// Credential file with one `user = password` per line
    #[arg(long = "auth-file", alias = "auth_file")]
    pub credentials_file: Option<PathBuf>,

    /// Watch the credential file and reload it on change
    #[arg(long)]
    pub inotify: bool,

    /// Also reload when the credential file is replaced via create or rename
    #[arg(long)]
    pub watch_replacements: bool,

    /// Capacity of the reload signal queue
    #[arg(long)]
    pub reload_queue_capacity: Option<usize>,

    /// Largest request body accepted, in bytes
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// trace, debug, info, warn or error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Optional TOML file providing defaults for the flags above
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Resolve flags and optional file into a validated `Config`.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        if let Some(addr) = self.bind_address {
            config.bind_address = addr;
        }
        if let Some(path) = self.credentials_file {
            config.credentials_file = path;
        }
        if self.inotify {
            config.live_reload = true;
        }
        if self.watch_replacements {
            config.watch_replacements = true;
        }
        if let Some(capacity) = self.reload_queue_capacity {
            config.reload_queue_capacity = capacity;
        }
        if let Some(limit) = self.max_body_bytes {
            config.max_body_bytes = limit;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.validate()?;
        Ok(config)
    }
}
