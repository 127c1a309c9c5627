//! Configuration loading and management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port the HTTP server binds to on 127.0.0.1
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared token required in the X-Shellgate-Token header.
    /// Empty disables auth; only do that behind another auth layer.
    #[serde(default)]
    pub auth_token: String,

    /// Caller identity the session state and audit log are keyed by
    #[serde(default = "default_caller")]
    pub caller: String,

    /// Session database location (defaults to ~/.shellgate/sessions.db)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            auth_token: String::new(),
            caller: default_caller(),
            db_path: None,
        }
    }
}

fn default_port() -> u16 {
    9878
}

fn default_caller() -> String {
    "operator".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from a directory, looking for .shellgate/config.toml
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(".shellgate/config.toml");
        if path.exists() {
            return Self::from_file(&path);
        }
        Ok(Self::default())
    }

    /// Global per-user data directory (~/.shellgate)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".shellgate"))
            .unwrap_or_else(|| PathBuf::from(".shellgate"))
    }

    /// Resolved session database path
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("sessions.db"))
    }

    /// Auth token, treating empty/whitespace as disabled
    pub fn auth_token(&self) -> Option<String> {
        let token = self.auth_token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}
