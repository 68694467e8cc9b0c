use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ReplyDeskError, Result};

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "REPLY_DESK_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached query stays fresh
    #[serde(default = "default_stale_secs")]
    pub stale_secs: u64,
    /// Maximum number of cached queries
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_secs: default_stale_secs(),
            capacity: default_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }
}

/// What happens to unsaved edits when another draft is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReselectPolicy {
    /// Drop the edits and load the newly selected draft
    #[default]
    Discard,
    /// Refuse to switch until the edits are saved or reverted
    Keep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub reselect_policy: ReselectPolicy,
    #[serde(default = "default_variations")]
    pub default_variations: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            reselect_policy: ReselectPolicy::default(),
            default_variations: default_variations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_results() -> u32 {
    20
}

fn default_stale_secs() -> u64 {
    300
}

fn default_capacity() -> usize {
    256
}

fn default_variations() -> u32 {
    1
}

fn default_token_file() -> PathBuf {
    PathBuf::from(".reply-desk/session.json")
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        let mut config = if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Self::default()
        } else {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                ReplyDeskError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                ReplyDeskError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ReplyDeskError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            ReplyDeskError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        tokio::fs::write(path, content).await.map_err(|e| {
            ReplyDeskError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!("Using API base URL from {}", API_URL_ENV);
                self.api.base_url = url;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(ReplyDeskError::ConfigError(
                "api.base_url cannot be empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ReplyDeskError::ConfigError(format!(
                "api.base_url must start with http:// or https://, got '{}'",
                url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ReplyDeskError::ConfigError(
                "api.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.api.timeout_secs > 300 {
            return Err(ReplyDeskError::ConfigError(
                "api.timeout_secs cannot exceed 300".to_string(),
            ));
        }

        if self.api.max_results == 0 || self.api.max_results > 500 {
            return Err(ReplyDeskError::ConfigError(
                "api.max_results must be between 1 and 500".to_string(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(ReplyDeskError::ConfigError(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }

        if self.editor.default_variations == 0 {
            return Err(ReplyDeskError::ConfigError(
                "editor.default_variations must be at least 1".to_string(),
            ));
        }

        if self.session.token_file.as_os_str().is_empty() {
            return Err(ReplyDeskError::ConfigError(
                "session.token_file cannot be empty".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        Self::default().save(path).await
    }
}
