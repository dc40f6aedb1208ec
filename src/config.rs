use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    10
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_jobs_interval_ms")]
    pub jobs_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            jobs_interval_ms: default_jobs_interval_ms(),
        }
    }
}

fn default_jobs_interval_ms() -> u64 {
    2000
}

impl PollingConfig {
    pub fn jobs_interval(&self) -> Duration {
        Duration::from_millis(self.jobs_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// How long fetched data counts as fresh. Zero means every mount refetches.
    #[serde(default)]
    pub stale_time_ms: u64,
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}
fn default_format() -> String {
    "text".to_string()
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;
        match url.scheme() {
            "http" | "https" => {}
            other => anyhow::bail!("api.base_url must use http or https, got '{}'", other),
        }

        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be > 0");
        }

        if self.polling.jobs_interval_ms == 0 {
            anyhow::bail!("polling.jobs_interval_ms must be > 0");
        }

        if self.search.top_k < 1 {
            anyhow::bail!("search.top_k must be >= 1");
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!(
                "Unknown logging format: '{}'. Must be text or json.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Loads `path` if it exists, otherwise falls back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}
