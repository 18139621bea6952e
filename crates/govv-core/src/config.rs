//! Application configuration management.
//!
//! Configuration is stored at `~/.config/govv/config.json`. The backend URL
//! and app origin can be overridden with `GOVV_BACKEND_URL` and
//! `GOVV_ORIGIN`, which the binary may load from a `.env` file first.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;
use crate::cache::CacheManagerConfig;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "govv";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the web app is served from when nothing is configured
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";

pub const BACKEND_URL_ENV: &str = "GOVV_BACKEND_URL";
pub const ORIGIN_ENV: &str = "GOVV_ORIGIN";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub origin: Option<String>,
    /// Overrides the built-in cache generation tag
    pub cache_version: Option<String>,
}

impl Config {
    /// Load the config file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Replace fields with any non-empty values `lookup` finds
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = non_empty(BACKEND_URL_ENV) {
            self.api_base_url = Some(url);
        }
        if let Some(origin) = non_empty(ORIGIN_ENV) {
            self.origin = Some(origin);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn backend_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn origin_url(&self) -> Result<Url> {
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_APP_ORIGIN);
        Url::parse(origin).with_context(|| format!("Invalid app origin {:?}", origin))
    }

    /// Cache manager settings for the configured origin
    pub fn cache_manager_config(&self) -> Result<CacheManagerConfig> {
        let mut config = CacheManagerConfig::new(self.origin_url()?);
        if let Some(ref version) = self.cache_version {
            config.version_tag = version.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CACHE_VERSION;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend_url(), DEFAULT_API_BASE_URL);

        let cache = config.cache_manager_config().unwrap();
        assert_eq!(cache.version_tag, CACHE_VERSION);
        assert_eq!(cache.origin.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            api_base_url: Some("http://file:8001".into()),
            origin: Some("http://file:3000".into()),
            cache_version: None,
        };
        let env: HashMap<&str, &str> = [(BACKEND_URL_ENV, "https://api.govv.app"), (ORIGIN_ENV, " ")].into();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend_url(), "https://api.govv.app");
        assert_eq!(config.origin.as_deref(), Some("http://file:3000"));
    }

    #[test]
    fn test_cache_version_override() {
        let config = Config {
            cache_version: Some("govv-pwa-v2".into()),
            ..Config::default()
        };
        assert_eq!(config.cache_manager_config().unwrap().version_tag, "govv-pwa-v2");
    }

    #[test]
    fn test_invalid_origin_is_an_error() {
        let config = Config {
            origin: Some("not a url".into()),
            ..Config::default()
        };
        assert!(config.cache_manager_config().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let config = Config {
            api_base_url: Some("https://api.govv.app".into()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
