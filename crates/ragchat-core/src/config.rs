use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::api::SendRoute;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: String,
    #[serde(default)]
    pub send_route: SendRoute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            send_route: SendRoute::default(),
            log_file: None,
        }
    }

    /// Load from the user config dir, falling back to defaults when no file
    /// exists, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::get_config_path()?)?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config.normalized())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// `RAGCHAT_SERVER_URL` and `RAGCHAT_SEND_ROUTE` win over the file.
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("RAGCHAT_SERVER_URL").filter(|u| !u.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(route) = var("RAGCHAT_SEND_ROUTE") {
            match SendRoute::from_str(&route) {
                Some(route) => self.send_route = route,
                None => tracing::warn!(%route, "ignoring unknown RAGCHAT_SEND_ROUTE"),
            }
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.server_url = self.server_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log_file {
            return Ok(path.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not determine cache directory"))?;

        Ok(cache_dir.join("ragchat").join("ragchat.log"))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ragchat").join("config.json"))
    }
}
