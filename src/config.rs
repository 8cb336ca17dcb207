//! Configuration module for feedrelay.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::note::Visibility;
use crate::{RelayError, Result};

/// Prefix for numbered feed environment variables (`FEEDRELAY_FEED_URL_1`, ...).
const FEED_URL_ENV_PREFIX: &str = "FEEDRELAY_FEED_URL";

/// A single watched feed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    /// Feed URL.
    pub url: String,
    /// Keywords; an entry is forwarded if any keyword appears in its title or body.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Schedule configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Interval between passes over all feeds, in seconds.
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_secs: u64,
    /// Post only the newest entry the first time a feed is seen.
    #[serde(default = "default_first_run_latest_only")]
    pub first_run_latest_only: bool,
}

fn default_fetch_interval() -> u64 {
    1800 // 30 minutes
}

fn default_first_run_latest_only() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: default_fetch_interval(),
            first_run_latest_only: default_first_run_latest_only(),
        }
    }
}

/// Delivery (Misskey) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Misskey host, with or without scheme.
    #[serde(default)]
    pub host: String,
    /// API token.
    #[serde(default)]
    pub auth_token: String,
    /// Note visibility (public, home, followers, specified).
    #[serde(default = "default_visibility")]
    pub visibility: String,
    /// Keep notes off the federated timeline.
    #[serde(default)]
    pub local_only: bool,
    /// Burst capacity of the rate limiter.
    #[serde(default = "default_max_permits")]
    pub max_permits: u32,
    /// Seconds between permit refills.
    #[serde(default = "default_refill_interval")]
    pub refill_interval_secs: u64,
    /// Request timeout in seconds.
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
}

fn default_visibility() -> String {
    "home".to_string()
}

fn default_max_permits() -> u32 {
    3
}

fn default_refill_interval() -> u64 {
    10
}

fn default_delivery_timeout() -> u64 {
    30
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            auth_token: String::new(),
            visibility: default_visibility(),
            local_only: false,
            max_permits: default_max_permits(),
            refill_interval_secs: default_refill_interval(),
            timeout_secs: default_delivery_timeout(),
        }
    }
}

/// Dedup cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite cache. Empty selects the in-memory cache.
    #[serde(default)]
    pub db_path: String,
    /// Delivered ids older than this many days are swept.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Hours between retention sweeps.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_hours: u64,
}

fn default_retention_days() -> u64 {
    7
}

fn default_cleanup_interval() -> u64 {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            retention_days: default_retention_days(),
            cleanup_interval_hours: default_cleanup_interval(),
        }
    }
}

/// Summarizer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
    /// Provider name ("", "noop" or "gemini").
    #[serde(default)]
    pub provider: String,
    /// Provider API key.
    #[serde(default)]
    pub api_key: String,
    /// Model name (provider default when empty).
    #[serde(default)]
    pub model: String,
    /// Maximum output tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Timeout for one summarize call, in seconds.
    #[serde(default = "default_summarizer_timeout")]
    pub timeout_secs: u64,
    /// System instruction (built-in prompt when empty).
    #[serde(default)]
    pub system_instruction: String,
    /// Article text longer than this many characters is truncated.
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,
    /// Entry bodies shorter than this are replaced by the fetched page text.
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
}

fn default_max_tokens() -> u32 {
    500
}

fn default_summarizer_timeout() -> u64 {
    30
}

fn default_max_input_length() -> usize {
    4000
}

fn default_min_content_length() -> usize {
    200
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            model: String::new(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_summarizer_timeout(),
            system_instruction: String::new(),
            max_input_length: default_max_input_length(),
            min_content_length: default_min_content_length(),
        }
    }
}

/// Article content fetching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Fetch the linked page when the entry body is too short to summarize.
    #[serde(default)]
    pub enabled: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_content_timeout")]
    pub timeout_secs: u64,
}

fn default_content_timeout() -> u64 {
    15
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: default_content_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Watched feeds.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    /// Schedule configuration.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Delivery configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Dedup cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Summarizer configuration.
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    /// Content fetching configuration.
    #[serde(default)]
    pub content: ContentConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load like [`Config::load_with_env`], starting from defaults when the
    /// file does not exist. Any other load error is returned.
    pub fn load_or_default_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load_with_env(path) {
            Err(RelayError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
            other => other,
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDRELAY_AUTH_TOKEN`: Misskey API token
    /// - `FEEDRELAY_LLM_API_KEY`: summarizer API key
    /// - `FEEDRELAY_FEED_URL_<n>` / `FEEDRELAY_FEED_URL_<n>_FILTER`: numbered feeds
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("FEEDRELAY_AUTH_TOKEN").filter(|v| !v.is_empty()) {
            self.delivery.auth_token = token;
        }
        if let Some(key) = lookup("FEEDRELAY_LLM_API_KEY").filter(|v| !v.is_empty()) {
            self.summarizer.api_key = key;
        }

        let numbered = numbered_feeds(&lookup);
        if !numbered.is_empty() {
            self.feeds = numbered;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            return Err(RelayError::Config(
                "no feeds configured; add [[feeds]] or set FEEDRELAY_FEED_URL_1".to_string(),
            ));
        }
        if let Some(feed) = self.feeds.iter().find(|f| f.url.trim().is_empty()) {
            return Err(RelayError::Config(format!(
                "feed with empty url (keywords: {:?})",
                feed.keywords
            )));
        }
        if self.delivery.host.is_empty() {
            return Err(RelayError::Config("delivery.host must be set".to_string()));
        }
        if self.delivery.auth_token.is_empty() {
            return Err(RelayError::Config(
                "delivery.auth_token must be set (or FEEDRELAY_AUTH_TOKEN)".to_string(),
            ));
        }
        if self.delivery.max_permits == 0 {
            return Err(RelayError::Config(
                "delivery.max_permits must be at least 1".to_string(),
            ));
        }
        if self.delivery.refill_interval_secs == 0 {
            return Err(RelayError::Config(
                "delivery.refill_interval_secs must be positive".to_string(),
            ));
        }
        if self.cache.cleanup_interval_hours == 0 {
            return Err(RelayError::Config(
                "cache.cleanup_interval_hours must be positive".to_string(),
            ));
        }
        if self.schedule.fetch_interval_secs == 0 {
            return Err(RelayError::Config(
                "schedule.fetch_interval_secs must be positive".to_string(),
            ));
        }
        self.visibility()?;
        Ok(())
    }

    /// Parsed note visibility.
    pub fn visibility(&self) -> Result<Visibility> {
        self.delivery.visibility.parse()
    }

    /// Whether the durable cache is configured.
    pub fn is_persistent_cache(&self) -> bool {
        !self.cache.db_path.is_empty()
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.fetch_interval_secs)
    }

    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.delivery.refill_interval_secs)
    }

    pub fn retention_period(&self) -> Duration {
        Duration::from_secs(self.cache.retention_days * 24 * 60 * 60)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache.cleanup_interval_hours * 60 * 60)
    }
}

/// Collect `FEEDRELAY_FEED_URL_1..N`, stopping at the first gap.
fn numbered_feeds<F>(lookup: &F) -> Vec<FeedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut feeds = Vec::new();
    for i in 1.. {
        let url = match lookup(&format!("{FEED_URL_ENV_PREFIX}_{i}")) {
            Some(url) if !url.is_empty() => url,
            _ => break,
        };
        let keywords = lookup(&format!("{FEED_URL_ENV_PREFIX}_{i}_FILTER"))
            .map(|raw| parse_keywords(&raw))
            .unwrap_or_default();
        feeds.push(FeedConfig { url, keywords });
    }
    feeds
}

/// Split a comma-separated keyword list, trimming and dropping empties.
fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
