use crate::roster::Roster;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "respawn.toml";

/// Complete tracker configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub roster: Roster,
    #[serde(default)]
    pub client: ClientConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// What a write does when the state file cannot be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Log the failure; the in-memory update stands
    #[default]
    BestEffort,
    /// Roll the update back and fail the request
    Strict,
}

impl FromStr for Durability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best_effort" => Ok(Durability::BestEffort),
            "strict" => Ok(Durability::Strict),
            other => Err(format!(
                "unknown durability '{}': expected 'best_effort' or 'strict'",
                other
            )),
        }
    }
}

impl fmt::Display for Durability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Durability::BestEffort => write!(f, "best_effort"),
            Durability::Strict => write!(f, "strict"),
        }
    }
}

/// State file configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub durability: Durability,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("boss_state.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            durability: Durability::default(),
        }
    }
}

/// Polling client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// How often to refetch state from the server (milliseconds)
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_ms: u64,
    /// How often to redraw countdowns locally (milliseconds)
    #[serde(default = "default_render_interval")]
    pub render_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Offline copy of the last fetched snapshot
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_fetch_interval() -> u64 {
    3000
}

fn default_render_interval() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("boss_state_cache.json")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            fetch_interval_ms: default_fetch_interval(),
            render_interval_ms: default_render_interval(),
            request_timeout_ms: default_request_timeout(),
            cache_path: default_cache_path(),
        }
    }
}

impl TrackerConfig {
    /// Resolve and load configuration.
    ///
    /// An explicit path must exist. Otherwise `RESPAWN_CONFIG` is tried, then
    /// `respawn.toml` in the working directory, then built-in defaults.
    /// Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RESPAWN_CONFIG").ok().map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            });

        let mut config = match path {
            Some(path) => load_config(&path)?,
            None => TrackerConfig::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config
            .roster
            .validate()
            .context("Invalid roster configuration")?;

        Ok(config)
    }

    /// Apply `PORT`, `RESPAWN_STATE_FILE`, `RESPAWN_DURABILITY` and `RESPAWN_SERVER_URL`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", v))?;
        }
        if let Some(v) = lookup("RESPAWN_STATE_FILE") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("RESPAWN_DURABILITY") {
            self.store.durability = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = lookup("RESPAWN_SERVER_URL") {
            self.client.server_url = v;
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: TrackerConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
