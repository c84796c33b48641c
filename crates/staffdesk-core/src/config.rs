//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, where tokens are kept, request timeout, cache revalidation
//! settings and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/staffdesk/config.json`. The
//! `STAFFDESK_API_URL` and `STAFFDESK_TOKEN_STORAGE` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{FileBackend, KeyringBackend, TokenBackend};
use crate::cache::RevalidationPolicy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "staffdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

pub const API_URL_ENV: &str = "STAFFDESK_API_URL";
pub const TOKEN_STORAGE_ENV: &str = "STAFFDESK_TOKEN_STORAGE";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEDUP_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// `tokens.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

impl FromStr for TokenStorage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenStorage::File),
            "keyring" => Ok(TokenStorage::Keyring),
            other => Err(anyhow!("Unknown token storage '{}' (expected file or keyring)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub token_storage: TokenStorage,
    pub request_timeout_secs: u64,
    pub dedup_interval_ms: u64,
    pub revalidate_on_reconnect: bool,
    pub revalidate_on_focus: bool,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            token_storage: TokenStorage::default(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            dedup_interval_ms: DEFAULT_DEDUP_MS,
            revalidate_on_reconnect: true,
            revalidate_on_focus: false,
            last_email: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
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
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Override file settings from the environment. Invalid values are
    /// logged and ignored.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(storage) = std::env::var(TOKEN_STORAGE_ENV) {
            match storage.parse() {
                Ok(storage) => self.token_storage = storage,
                Err(e) => warn!(error = %e, "Ignoring {}", TOKEN_STORAGE_ENV),
            }
        }
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

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn revalidation_policy(&self) -> RevalidationPolicy {
        RevalidationPolicy {
            dedup_interval: Duration::from_millis(self.dedup_interval_ms),
            revalidate_on_reconnect: self.revalidate_on_reconnect,
            revalidate_on_focus: self.revalidate_on_focus,
        }
    }

    /// The token backend this configuration selects.
    pub fn token_backend(&self) -> Result<Arc<dyn TokenBackend>> {
        Ok(match self.token_storage {
            TokenStorage::File => Arc::new(FileBackend::new(self.cache_dir()?)),
            TokenStorage::Keyring => Arc::new(KeyringBackend::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.revalidation_policy(), RevalidationPolicy::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_base_url: "https://hr.example.com/api".to_string(),
            token_storage: TokenStorage::Keyring,
            last_email: Some("ada@example.com".to_string()),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"request_timeout_secs": 5}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.token_storage, TokenStorage::File);
        assert!(config.revalidate_on_reconnect);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_token_storage_parse() {
        assert_eq!("Keyring".parse::<TokenStorage>().unwrap(), TokenStorage::Keyring);
        assert_eq!(" file ".parse::<TokenStorage>().unwrap(), TokenStorage::File);
        assert!("vault".parse::<TokenStorage>().is_err());
    }
}
