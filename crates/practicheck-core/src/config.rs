//! Application configuration management.
//!
//! Holds the two service base URLs, the idle timeout thresholds, the token
//! storage backend and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/practicheck/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiClient, AuthApi};
use crate::auth::{
    FileStorage, KeyringStorage, MemoryStorage, Storage, StorageNamespace, TokenStore,
};
use crate::session::{
    AuthContext, SystemClock, TimeoutPolicy, DEFAULT_ACTIVITY_DEBOUNCE_MS,
    DEFAULT_LOGOUT_AFTER_SECS, DEFAULT_WARNING_AFTER_SECS,
};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "practicheck";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_AUTH_BASE_URL: &str = "http://localhost:8002";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8001";

pub const ENV_AUTH_URL: &str = "PRACTICHECK_AUTH_URL";
pub const ENV_API_URL: &str = "PRACTICHECK_API_URL";
pub const ENV_EMAIL: &str = "PRACTICHECK_EMAIL";
pub const ENV_PASSWORD: &str = "PRACTICHECK_PASSWORD";

/// Where the token store keeps its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// `session.json` in the cache directory
    #[default]
    File,
    Keyring,
    /// Nothing survives the process
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth_base_url: String,
    pub api_base_url: String,
    pub warning_after_secs: u64,
    pub logout_after_secs: u64,
    /// Keypresses closer together than this reset the idle timer once
    pub activity_debounce_ms: u64,
    pub request_timeout_secs: Option<u64>,
    pub storage: StorageKind,
    pub storage_namespace: StorageNamespace,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            warning_after_secs: DEFAULT_WARNING_AFTER_SECS,
            logout_after_secs: DEFAULT_LOGOUT_AFTER_SECS,
            activity_debounce_ms: DEFAULT_ACTIVITY_DEBOUNCE_MS,
            request_timeout_secs: None,
            storage: StorageKind::default(),
            storage_namespace: StorageNamespace::Default,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
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

    /// Apply `PRACTICHECK_*` URL and email overrides from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = lookup(ENV_AUTH_URL) {
            self.auth_base_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(email) = lookup(ENV_EMAIL) {
            self.last_email = Some(email);
        }
    }

    pub fn timeout_policy(&self) -> Result<TimeoutPolicy> {
        let policy = TimeoutPolicy::from_secs(self.warning_after_secs, self.logout_after_secs)
            .context("Invalid session timeout settings")?;
        Ok(policy.with_debounce(Duration::from_millis(self.activity_debounce_ms)))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn storage_backend(&self) -> Result<Arc<dyn Storage>> {
        Ok(match self.storage {
            StorageKind::File => Arc::new(FileStorage::in_dir(self.cache_dir()?)),
            StorageKind::Keyring => Arc::new(KeyringStorage),
            StorageKind::Memory => Arc::new(MemoryStorage::new()),
        })
    }

    pub fn token_store(&self) -> Result<TokenStore> {
        Ok(TokenStore::new(self.storage_backend()?, self.storage_namespace))
    }

    /// Wire up an `AuthContext` over the configured services and storage.
    pub fn auth_context(&self) -> Result<AuthContext> {
        self.auth_context_with(self.token_store()?)
    }

    pub fn auth_context_with(&self, store: TokenStore) -> Result<AuthContext> {
        let timeout = self.request_timeout();
        let auth_client = ApiClient::new(&self.auth_base_url, store.clone(), timeout)?;
        let api_client = ApiClient::new(&self.api_base_url, store.clone(), timeout)?;

        Ok(AuthContext::new(
            store,
            AuthApi::new(auth_client, api_client.clone()),
            api_client,
            self.timeout_policy()?,
            Arc::new(SystemClock),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.auth_base_url, "http://localhost:8002");
        assert_eq!(config.api_base_url, "http://localhost:8001");
        assert_eq!(config.warning_after_secs, 1500);
        assert_eq!(config.logout_after_secs, 1800);
        assert_eq!(config.storage, StorageKind::File);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            storage: StorageKind::Keyring,
            storage_namespace: StorageNamespace::Hirer,
            last_email: Some("a@b.com".to_string()),
            request_timeout_secs: Some(15),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"warning_after_secs": 300, "logout_after_secs": 330, "storage": "memory"}"#)
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.warning_after_secs, 300);
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.auth_base_url, DEFAULT_AUTH_BASE_URL);
        assert_eq!(
            config.timeout_policy().unwrap().warning_window(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_activity_debounce_reaches_policy() {
        let config = Config {
            warning_after_secs: 300,
            logout_after_secs: 330,
            activity_debounce_ms: 0,
            ..Config::default()
        };
        assert_eq!(
            config.timeout_policy().unwrap(),
            TimeoutPolicy::from_secs(300, 330)
                .unwrap()
                .with_debounce(Duration::ZERO)
        );
        assert_eq!(Config::default().activity_debounce_ms, 1000);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let config = Config {
            warning_after_secs: 600,
            logout_after_secs: 60,
            ..Config::default()
        };
        assert!(config.timeout_policy().is_err());
        assert!(config
            .auth_context_with(TokenStore::new(
                Arc::new(MemoryStorage::new()),
                StorageNamespace::Default
            ))
            .is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_AUTH_URL, "http://auth.test"),
            (ENV_API_URL, ""),
            (ENV_EMAIL, "x@y.com"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.auth_base_url, "http://auth.test");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.last_email.as_deref(), Some("x@y.com"));
    }

    #[test]
    fn test_memory_context_starts_logged_out() {
        let config = Config {
            storage: StorageKind::Memory,
            ..Config::default()
        };
        let ctx = config.auth_context().unwrap();
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.route().path(), "/");
        assert_eq!(ctx.policy().logout_after(), Duration::from_secs(1800));
    }
}
