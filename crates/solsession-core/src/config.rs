//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! selects the backend environment and remembers the last email used to log in.
//!
//! Configuration is stored at `~/.config/solsession/config.json`. The
//! `SOLSESSION_PRODUCTION` and `SOLSESSION_API_URL` environment variables
//! override what is on disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "solsession";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Durable session file name in the cache directory
const SESSION_FILE: &str = "session.json";

const DEFAULT_API_URL_DEV: &str = "http://localhost:8071/api";
const DEFAULT_API_URL_PROD: &str = "https://sol-solution-production.up.railway.app/api";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_PRODUCTION: &str = "SOLSESSION_PRODUCTION";
const ENV_API_URL: &str = "SOLSESSION_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub production: bool,
    pub api_url_dev: String,
    pub api_url_prod: String,
    pub request_timeout_secs: u64,
    pub last_email: Option<String>,
    /// Explicit base URL, takes precedence over the dev/prod pair
    #[serde(skip)]
    pub api_url_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            production: false,
            api_url_dev: DEFAULT_API_URL_DEV.to_string(),
            api_url_prod: DEFAULT_API_URL_PROD.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_email: None,
            api_url_override: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(ENV_PRODUCTION) {
            self.production = matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_url_override = Some(url.trim().to_string());
        }
    }

    /// Base URL of the backend API, without a trailing slash
    pub fn api_url(&self) -> &str {
        let url = match self.api_url_override {
            Some(ref url) => url.as_str(),
            None if self.production => self.api_url_prod.as_str(),
            None => self.api_url_dev.as_str(),
        };
        url.trim_end_matches('/')
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Location of the durable session store
    pub fn session_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(SESSION_FILE))
    }
}
