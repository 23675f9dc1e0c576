//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API base URL, the active team GUID, and the last used
//! username.
//!
//! Configuration is stored at `~/.config/matchday/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "matchday";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default base URL for the matchday API
const DEFAULT_API_BASE_URL: &str = "https://api.matchday.app";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Overrides the production API base URL (staging, local development).
    pub api_base_url: Option<String>,
    pub team_guid: Option<String>,
    pub last_username: Option<String>,
    /// Accept `dev.`-prefixed tokens that skip expiry checks. Development
    /// builds only; leave off in production.
    #[serde(default)]
    pub allow_dev_tokens: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
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

    /// The API base URL, falling back to production when not overridden.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(ref team) = self.team_guid {
            path = path.join(team);
        }
        Ok(path)
    }
}
