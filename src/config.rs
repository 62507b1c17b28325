//! Configuration loading and management
//!
//! Handles parsing of `kanban.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "kanban.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one JSON record per project
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Discord API access
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Project store settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            discord: DiscordConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("kanban-data")
}

/// Discord-related configuration
///
/// The bot token itself never lives in the file; only the name of the
/// environment variable that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the bot token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base() -> String {
    crate::platform::discord::DEFAULT_API_BASE.to_string()
}

fn default_token_env() -> String {
    "DISCORD_TOKEN".to_string()
}

fn default_timeout_ms() -> u64 {
    crate::platform::discord::DEFAULT_TIMEOUT_MS
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DiscordConfig {
    /// Read the bot token from the configured environment variable.
    pub fn token(&self) -> Result<String> {
        let var = self.token_env.trim();
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(Error::InvalidConfig(format!(
                "environment variable {var} is not set"
            ))),
        }
    }
}

/// Store-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long to wait for the data directory lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `kanban.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given (it must exist), else `./kanban.toml` when
    /// present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("data_dir cannot be empty".to_string()));
        }
        if self.discord.api_base.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "discord.api_base cannot be empty".to_string(),
            ));
        }
        if self.discord.token_env.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "discord.token_env cannot be empty".to_string(),
            ));
        }
        if self.discord.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "discord.timeout_ms must be > 0".to_string(),
            ));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
