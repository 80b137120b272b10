//! Configuration management using the prefer crate for discovery.
//!
//! A config file is optional. Every field falls back to a built-in default
//! and the parsed [`Config`] is resolved into validated [`Settings`].

mod platforms;

pub use platforms::{default_platforms, PlatformConfig};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::extractors::Extractor;
use crate::http_client::{Fetcher, RetryPolicy};
use crate::models::PlatformDescriptor;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::refresh::RefreshConfig;
use crate::token::TokenConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "vidlink.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_before_expiry: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_interval: Option<u64>,
}

/// `[refresh]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Seconds between sweeps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_before_expiry: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after: Option<u64>,
    /// Seconds a failed row waits before it is retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_backoff: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_delay_ms: Option<u64>,
}

/// `[token]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness_hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timeout: Option<u64>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// `"impersonate"` for rotating browser strings, or a fixed string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Budget for one whole extraction in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max_jitter_ms: Option<u64>,
    /// Minimum delay between requests to one domain in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub refresh: RefreshSection,
    #[serde(default)]
    pub token: TokenSection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<PlatformConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `vidlink` config file in the standard locations.
    /// Falls back to defaults when none is found or it fails to parse.
    pub async fn load() -> Self {
        match prefer::load("vidlink").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config file: {}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, or JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parsed = match ext {
            "toml" => toml::from_str(contents).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            _ => serde_json::from_str(contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Directory relative paths resolve against: the config file's parent.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Validate and resolve into runtime settings.
    pub fn into_settings(&self, base_dir: &Path) -> Result<Settings, ConfigError> {
        let mut settings = Settings::default();

        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        settings.user_agent = self.user_agent.clone();

        let retry = &mut settings.retry;
        if let Some(secs) = self.request_timeout {
            retry.request_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.max_retries {
            if n == 0 {
                return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
            }
            retry.max_retries = n;
        }
        if let Some(ms) = self.retry_base_delay_ms {
            retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_max_jitter_ms {
            retry.max_jitter = Duration::from_millis(ms);
        }
        if let Some(secs) = self.extract_timeout {
            settings.extract_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.request_delay_ms {
            settings.request_delay = Duration::from_millis(ms);
        }

        self.apply_cache(&mut settings.cache);
        self.apply_refresh(&mut settings.refresh)?;
        self.apply_token(&mut settings.token);

        if !self.platforms.is_empty() {
            let builtins = default_platforms();
            settings.platforms = self.platforms.iter().map(|p| p.resolve(&builtins)).collect();
        }
        validate_platforms(&settings.platforms)?;

        Ok(settings)
    }

    fn apply_cache(&self, cache: &mut CacheConfig) {
        let section = &self.cache;
        if let Some(enabled) = section.enabled {
            cache.enabled = enabled;
        }
        if let Some(secs) = section.default_ttl {
            cache.default_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = section.refresh_before_expiry {
            cache.refresh_before_expiry = Duration::from_secs(secs);
        }
        if let Some(secs) = section.cleanup_interval {
            cache.cleanup_interval = Duration::from_secs(secs.max(1));
        }
    }

    fn apply_refresh(&self, refresh: &mut RefreshConfig) -> Result<(), ConfigError> {
        let section = &self.refresh;
        if let Some(enabled) = section.enabled {
            refresh.enabled = enabled;
        }
        if let Some(secs) = section.min_interval {
            refresh.min_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = section.interval {
            refresh.interval = Duration::from_secs(secs);
        }
        if refresh.interval < refresh.min_interval {
            tracing::warn!(
                "refresh.interval {}s is below refresh.min_interval, using {}s",
                refresh.interval.as_secs(),
                refresh.min_interval.as_secs()
            );
            refresh.interval = refresh.min_interval;
        }
        if let Some(secs) = section.refresh_before_expiry {
            refresh.lookahead = Duration::from_secs(secs);
        }
        if let Some(secs) = section.stale_after {
            refresh.stale_after = Duration::from_secs(secs);
        }
        if let Some(secs) = section.failure_backoff {
            refresh.failure_backoff = Duration::from_secs(secs);
        }
        if let Some(size) = section.batch_size {
            if size == 0 {
                return Err(ConfigError::Invalid("refresh.batch_size must be at least 1".into()));
            }
            refresh.batch_size = size;
        }
        if let Some(ms) = section.item_delay_ms {
            refresh.item_delay = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn apply_token(&self, token: &mut TokenConfig) {
        let section = &self.token;
        token.endpoint = section.endpoint.clone().filter(|s| !s.is_empty());
        token.sample_page = section.sample_page.clone().filter(|s| !s.is_empty());
        token.fallback = section.fallback.clone().filter(|s| !s.is_empty());
        if let Some(hours) = section.freshness_hours {
            token.freshness = Duration::from_secs(hours * 3600);
        }
        if let Some(secs) = section.source_timeout {
            token.source_timeout = Duration::from_secs(secs);
        }
    }
}

fn validate_platforms(platforms: &[PlatformDescriptor]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for platform in platforms {
        if !seen.insert(platform.id.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "platform '{}' is configured twice",
                platform.id
            )));
        }
        if Extractor::from_id(&platform.extractor).is_none() {
            return Err(ConfigError::Invalid(format!(
                "platform '{}' names unknown extractor '{}' (known: {})",
                platform.id,
                platform.extractor,
                Extractor::IDS.join(", ")
            )));
        }
    }
    Ok(())
}

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    pub database_filename: String,
    /// Overrides `data_dir`/`database_filename` when set. Set via DATABASE_URL.
    pub database_url: Option<String>,
    pub user_agent: Option<String>,
    pub retry: RetryPolicy,
    pub extract_timeout: Duration,
    pub request_delay: Duration,
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    pub token: TokenConfig,
    pub platforms: Vec<PlatformDescriptor>,
}

impl Default for Settings {
    fn default() -> Self {
        // Local data dir -> home dir -> current dir
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidlink");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            user_agent: None,
            retry: RetryPolicy::default(),
            extract_timeout: Duration::from_secs(60),
            request_delay: Duration::ZERO,
            cache: CacheConfig::default(),
            refresh: RefreshConfig::default(),
            token: TokenConfig::new(),
            platforms: default_platforms(),
        }
    }
}

impl Settings {
    /// Database URL, constructed from the data directory unless set explicitly.
    pub fn database_url(&self) -> String {
        match self.database_url {
            Some(ref url) => url.clone(),
            None => format!("sqlite:{}", self.database_path().display()),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    /// Production fetcher: reqwest transport, configured identity and politeness.
    pub fn fetcher(&self) -> Fetcher {
        let limiter = RateLimiter::with_config(RateLimitConfig::with_base_delay(self.request_delay));
        Fetcher::reqwest(self.retry.clone())
            .with_user_agent(self.user_agent.as_deref())
            .with_rate_limiter(limiter)
    }
}

/// Load configuration from `explicit` or by discovery, then resolve it.
/// DATABASE_URL in the environment takes precedence over the file.
pub async fn load_settings(explicit: Option<&Path>) -> Result<(Settings, Config), ConfigError> {
    let config = match explicit {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            Config::load_from_path(Path::new(&expanded)).await?
        }
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let mut settings = config.into_settings(&base_dir)?;

    if let Some(url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment: {}", url);
        settings.database_url = Some(url);
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Config::default().into_settings(Path::new("/srv")).unwrap();
        assert_eq!(settings.retry.max_retries, 4);
        assert_eq!(settings.extract_timeout, Duration::from_secs(60));
        assert_eq!(settings.cache.default_ttl, Duration::from_secs(3600));
        assert_eq!(settings.refresh.interval, Duration::from_secs(1200));
        assert_eq!(settings.refresh.batch_size, 50);
        assert_eq!(settings.platforms.len(), 12);
        assert!(settings.database_url().ends_with("vidlink.db"));
    }

    #[test]
    fn test_toml_sections() {
        let toml = r#"
data_dir = "data"
max_retries = 2
request_delay_ms = 250

[cache]
default_ttl = 120

[refresh]
interval = 60
min_interval = 900
failure_backoff = 120
batch_size = 10

[token]
fallback = "abc"
freshness_hours = 2

[[platforms]]
id = "terabox"
domains = ["knownhost.example"]
"#;
        let config = Config::parse(toml, Path::new("vidlink.toml")).unwrap();
        let settings = config.into_settings(Path::new("/etc/vidlink")).unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/etc/vidlink/data"));
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.request_delay, Duration::from_millis(250));
        assert_eq!(settings.cache.default_ttl, Duration::from_secs(120));
        // clamped to the minimum
        assert_eq!(settings.refresh.interval, Duration::from_secs(900));
        assert_eq!(settings.refresh.batch_size, 10);
        assert_eq!(settings.refresh.failure_backoff, Duration::from_secs(120));
        assert_eq!(settings.token.fallback.as_deref(), Some("abc"));
        assert_eq!(settings.token.freshness, Duration::from_secs(7200));
        assert_eq!(settings.platforms.len(), 1);
        assert!(settings.platforms[0].matches_host("knownhost.example"));
    }

    #[test]
    fn test_yaml_and_json() {
        let yaml = "cache:\n  enabled: false\nextract_timeout: 30\n";
        let settings = Config::parse(yaml, Path::new("c.yaml"))
            .unwrap()
            .into_settings(Path::new("."))
            .unwrap();
        assert!(!settings.cache.enabled);
        assert_eq!(settings.extract_timeout, Duration::from_secs(30));

        let json = r#"{"refresh": {"item_delay_ms": 0}}"#;
        let settings = Config::parse(json, Path::new("c.json"))
            .unwrap()
            .into_settings(Path::new("."))
            .unwrap();
        assert_eq!(settings.refresh.item_delay, Duration::ZERO);
    }

    #[test]
    fn test_rejects_unknown_extractor() {
        let config = Config {
            platforms: vec![PlatformConfig {
                id: "tube".into(),
                extractor: Some("youtube".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = config.into_settings(Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Config::parse("max_retries = [", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vidlink.toml");
        std::fs::write(&path, "database = \"links.db\"\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
        let settings = config.into_settings(dir.path()).unwrap();
        assert_eq!(settings.database_path(), dir.path().join("links.db"));
    }
}
