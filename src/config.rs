//! Configuration: `config.toml`, environment, and command-line overrides.
//!
//! Precedence is CLI > env > file > defaults.

use crate::backoff::BackoffOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_USER: &str = "HNAV_USER";
pub const ENV_AUTH: &str = "HNAV_AUTH";
pub const ENV_THEME: &str = "HNAV_THEME";

const DEFAULT_ITEM_API_URL: &str = "https://hn.algolia.com/api/v1";
const DEFAULT_ACTIVITY_API_URL: &str = "http://127.0.0.1:8787";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub username: Option<String>,
    pub auth_token: Option<String>,
    pub activity_api_url: String,
    pub item_api_url: String,
    pub request_timeout_secs: u64,
    pub theme: String,
    /// `EnvFilter` directive; `HNAV_LOG` wins when set.
    pub log_filter: Option<String>,
    pub backoff: BackoffOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            auth_token: None,
            activity_api_url: DEFAULT_ACTIVITY_API_URL.to_string(),
            item_api_url: DEFAULT_ITEM_API_URL.to_string(),
            request_timeout_secs: 10,
            theme: "dark".to_string(),
            log_filter: None,
            backoff: BackoffOptions::default(),
        }
    }
}

/// Values taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub username: Option<String>,
    pub theme: Option<String>,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields defaults; an explicitly named file
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        Ok(config)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(dir.join("hnav").join("config.toml"))
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(user) = non_empty(ENV_USER) {
            self.username = Some(user);
        }
        if let Some(auth) = non_empty(ENV_AUTH) {
            self.auth_token = Some(auth);
        }
        if let Some(theme) = non_empty(ENV_THEME) {
            self.theme = theme;
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(user) = &overrides.username {
            self.username = Some(user.clone());
        }
        if let Some(theme) = &overrides.theme {
            self.theme = theme.clone();
        }
    }

    /// Load the file, then layer env and CLI on top.
    pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
