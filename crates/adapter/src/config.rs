//! Relay and client configuration
//!
//! Defaults, then an optional JSON file named by `BATTLE_TETRIS_CONFIG`,
//! then individual environment variables (which win).

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use battle_tetris_types::DEFAULT_PORT;

pub const ENV_CONFIG: &str = "BATTLE_TETRIS_CONFIG";
pub const ENV_HOST: &str = "BATTLE_TETRIS_HOST";
pub const ENV_PORT: &str = "BATTLE_TETRIS_PORT";
pub const ENV_WIRE_LOG: &str = "BATTLE_TETRIS_WIRE_LOG";
pub const ENV_NAME: &str = "BATTLE_TETRIS_NAME";
pub const ENV_OPPONENT: &str = "BATTLE_TETRIS_OPPONENT";
pub const ENV_LOG: &str = "BATTLE_TETRIS_LOG";
pub const ENV_AUTO_ACCEPT: &str = "BATTLE_TETRIS_AUTO_ACCEPT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid socket address {0:?}")]
    Addr(String),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_string(),
        source,
    })
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let addr = format!("{host}:{port}");
    addr.parse().map_err(|_| ConfigError::Addr(addr))
}

/// Relay server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JSON-lines record of every relayed line
    pub wire_log: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            wire_log: None,
        }
    }
}

impl ServerConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match non_empty(lookup(ENV_CONFIG)) {
            Some(path) => read_json(&path)?,
            None => Self::default(),
        };
        if let Some(host) = non_empty(lookup(ENV_HOST)) {
            config.host = host;
        }
        if let Some(port) = non_empty(lookup(ENV_PORT)).and_then(|s| s.parse().ok()) {
            config.port = port;
        }
        if let Some(path) = non_empty(lookup(ENV_WIRE_LOG)) {
            config.wire_log = Some(path);
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }
}

/// Terminal client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    /// Challenge this player on connect; otherwise wait in the lobby
    pub opponent: Option<String>,
    /// Accept incoming challenges without asking
    pub auto_accept: bool,
    /// Append tracing output here (stderr is unusable in raw mode)
    pub log_path: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            name: "player".to_string(),
            opponent: None,
            auto_accept: false,
            log_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match non_empty(lookup(ENV_CONFIG)) {
            Some(path) => read_json(&path)?,
            None => Self::default(),
        };
        if let Some(host) = non_empty(lookup(ENV_HOST)) {
            config.host = host;
        }
        if let Some(port) = non_empty(lookup(ENV_PORT)).and_then(|s| s.parse().ok()) {
            config.port = port;
        }
        if let Some(name) = non_empty(lookup(ENV_NAME)) {
            config.name = name;
        }
        if let Some(opponent) = non_empty(lookup(ENV_OPPONENT)) {
            config.opponent = Some(opponent);
        }
        if let Some(flag) = non_empty(lookup(ENV_AUTO_ACCEPT)) {
            config.auto_accept = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(path) = non_empty(lookup(ENV_LOG)) {
            config.log_path = Some(path);
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }
}
