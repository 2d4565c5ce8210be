//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Largest page the search API accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Environment variable that overrides `api.bearer_token`.
pub const BEARER_TOKEN_ENV: &str = "TAGWATCH_BEARER_TOKEN";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    /// Handles whose posts are trusted, compared case-insensitively
    #[serde(default)]
    pub allowlist: Vec<String>,

    /// Poll loop settings
    #[serde(default)]
    pub poller: PollerConfig,

    /// Search API client settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Record storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Read service settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Replace the bearer token with the environment value when it is set.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(BEARER_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.api.bearer_token = Some(token);
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.poller.hashtag.trim().is_empty() {
            return Err(AppError::validation("poller.hashtag is empty"));
        }
        if self.poller.interval_secs == 0 {
            return Err(AppError::validation("poller.interval_secs must be > 0"));
        }
        if self.poller.page_size == 0 || self.poller.page_size > MAX_PAGE_SIZE {
            return Err(AppError::validation(format!(
                "poller.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.poller.max_pages == Some(0) {
            return Err(AppError::validation("poller.max_pages must be > 0"));
        }
        if self.poller.merge_concurrency == 0 {
            return Err(AppError::validation("poller.merge_concurrency must be > 0"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        Url::parse(&self.api.endpoint)
            .map_err(|e| AppError::validation(format!("api.endpoint is not a URL: {e}")))?;
        if self.allowlist.iter().any(|h| h.trim().is_empty()) {
            return Err(AppError::validation("allowlist contains an empty handle"));
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(AppError::validation("storage.data_dir is empty"));
        }
        Ok(())
    }

    /// Allow-listed handles, lowercased, without a leading `@`.
    pub fn allowlist_set(&self) -> HashSet<String> {
        self.allowlist
            .iter()
            .map(|h| h.trim().trim_start_matches('@').to_lowercase())
            .filter(|h| !h.is_empty())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            allowlist: Vec::new(),
            poller: PollerConfig::default(),
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Search text, usually the tracked hashtag
    #[serde(default = "defaults::hashtag")]
    pub hashtag: String,

    /// Seconds between cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Posts requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Upper bound on pages fetched in one cycle; unbounded when unset
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Projects merged in parallel per page
    #[serde(default = "defaults::merge_concurrency")]
    pub merge_concurrency: usize,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            hashtag: defaults::hashtag(),
            interval_secs: defaults::interval(),
            page_size: defaults::page_size(),
            max_pages: None,
            merge_concurrency: defaults::merge_concurrency(),
        }
    }
}

/// Search API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Search endpoint URL
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            bearer_token: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Record storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<digits>.json` per project
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

/// Read service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Poller defaults
    pub fn hashtag() -> String {
        "#tagwatch".into()
    }
    pub fn interval() -> u64 {
        60
    }
    pub fn page_size() -> usize {
        100
    }
    pub fn merge_concurrency() -> usize {
        8
    }

    // API defaults
    pub fn endpoint() -> String {
        "https://api.twitter.com/1.1/search/tweets.json".into()
    }
    pub fn user_agent() -> String {
        "tagwatch/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    // Server defaults
    pub fn host() -> String {
        "127.0.0.1".into()
    }
    pub fn port() -> u16 {
        8081
    }
}
