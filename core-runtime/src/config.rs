//! # Sync Engine Configuration
//!
//! Provides configuration management for the membership sync engine.
//!
//! ## Overview
//!
//! Configuration is assembled with a builder that validates eagerly, so a
//! misconfigured daemon fails at startup instead of on its first pass.
//! [`SyncEngineConfig::from_env`] reads the same settings from process
//! environment variables (after any `.env` file has been loaded by the
//! binary).
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `SYNC_API_BASE_URL` | `https://api.whop.com` |
//! | `SYNC_API_TOKEN` (fallback `V2_PRODUCTS_TOKEN`) | required |
//! | `UPDATE_INTERVAL_MS` | `60000` |
//! | `SYNC_PAGE_SIZE` | `50` |
//! | `SYNC_PAGE_DELAY_MS` | `200` |
//! | `SYNC_REQUEST_TIMEOUT_MS` | `30000` |
//! | `SYNC_DATABASE_PATH` | `sync.db` |
//! | `SYNC_LOG_LEVEL` | `info` |
//! | `SYNC_LOG_FORMAT` | build-dependent |
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::SyncEngineConfig;
//! use std::time::Duration;
//!
//! let config = SyncEngineConfig::builder()
//!     .api_token("tok_live_123")
//!     .per_page(25)
//!     .poll_interval(Duration::from_secs(120))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.per_page, 25);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::SyncEngineConfig;
//!
//! // No API token: building fails with an actionable message
//! SyncEngineConfig::builder().build().expect("Should fail - missing token");
//! ```

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LoggingConfig};
use bridge_traits::LogLevel;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.whop.com";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 200;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_DATABASE_PATH: &str = "sync.db";

/// Settings for one sync engine instance.
///
/// Use [`SyncEngineConfig::builder`] or [`SyncEngineConfig::from_env`] to
/// construct. Both validate before returning.
#[derive(Clone)]
pub struct SyncEngineConfig {
    /// Remote API origin, without a trailing slash
    pub base_url: String,

    /// Bearer token sent with every request
    pub api_token: String,

    /// Target time between the starts of consecutive passes
    pub poll_interval: Duration,

    /// Records requested per page (`per` query parameter)
    pub per_page: u32,

    /// Pause between consecutive page fetches within a sub-pass
    pub page_delay: Duration,

    /// Per-request timeout for the HTTP client
    pub request_timeout: Duration,

    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Logging setup used by the daemon binary
    pub logging: LoggingConfig,
}

impl std::fmt::Debug for SyncEngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngineConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"[REDACTED]")
            .field("poll_interval", &self.poll_interval)
            .field("per_page", &self.per_page)
            .field("page_delay", &self.page_delay)
            .field("request_timeout", &self.request_timeout)
            .field("database_path", &self.database_path)
            .field("logging", &self.logging)
            .finish()
    }
}

impl SyncEngineConfig {
    /// Creates a new builder with every optional field at its default.
    pub fn builder() -> SyncEngineConfigBuilder {
        SyncEngineConfigBuilder::default()
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a variable cannot be parsed or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// `from_env` delegates here; tests pass a map-backed closure so they
    /// never mutate the real process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut builder = Self::builder();

        if let Some(url) = get("SYNC_API_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(token) = get("SYNC_API_TOKEN").or_else(|| get("V2_PRODUCTS_TOKEN")) {
            builder = builder.api_token(token);
        }
        if let Some(ms) = get("UPDATE_INTERVAL_MS") {
            builder = builder.poll_interval(Duration::from_millis(parse_number(
                "UPDATE_INTERVAL_MS",
                &ms,
            )?));
        }
        if let Some(size) = get("SYNC_PAGE_SIZE") {
            builder = builder.per_page(parse_number("SYNC_PAGE_SIZE", &size)?);
        }
        if let Some(ms) = get("SYNC_PAGE_DELAY_MS") {
            builder = builder.page_delay(Duration::from_millis(parse_number(
                "SYNC_PAGE_DELAY_MS",
                &ms,
            )?));
        }
        if let Some(ms) = get("SYNC_REQUEST_TIMEOUT_MS") {
            builder = builder.request_timeout(Duration::from_millis(parse_number(
                "SYNC_REQUEST_TIMEOUT_MS",
                &ms,
            )?));
        }
        if let Some(path) = get("SYNC_DATABASE_PATH") {
            builder = builder.database_path(path);
        }

        let mut logging = LoggingConfig::default();
        if let Some(level) = get("SYNC_LOG_LEVEL") {
            let level: LogLevel = level
                .parse()
                .map_err(|e| Error::Config(format!("SYNC_LOG_LEVEL: {}", e)))?;
            logging = logging.with_level(level);
        }
        if let Some(format) = get("SYNC_LOG_FORMAT") {
            logging = logging.with_format(format.parse::<LogFormat>()?);
        }

        builder.logging(logging).build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The API token is not blank
    /// - The base URL uses http or https
    /// - The page size is between 1 and [`MAX_PER_PAGE`]
    /// - The poll interval and request timeout are non-zero
    /// - The database path is not empty
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(Error::Config(
                "API token is required. Set SYNC_API_TOKEN or use .api_token() to set it."
                    .to_string(),
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }

        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PER_PAGE, self.per_page
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::Config(
                "Poll interval must be greater than 0ms".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

/// Builder for constructing [`SyncEngineConfig`] instances.
#[derive(Debug, Default)]
pub struct SyncEngineConfigBuilder {
    base_url: Option<String>,
    api_token: Option<String>,
    poll_interval: Option<Duration>,
    per_page: Option<u32>,
    page_delay: Option<Duration>,
    request_timeout: Option<Duration>,
    database_path: Option<PathBuf>,
    logging: Option<LoggingConfig>,
}

impl SyncEngineConfigBuilder {
    /// Sets the remote API origin. A trailing slash is stripped.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the bearer token (required).
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the token is missing or any value is out
    /// of range.
    pub fn build(self) -> Result<SyncEngineConfig> {
        let api_token = self.api_token.ok_or_else(|| {
            Error::Config(
                "API token is required. Set SYNC_API_TOKEN or use .api_token() to set it."
                    .to_string(),
            )
        })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let config = SyncEngineConfig {
            base_url,
            api_token,
            poll_interval: self
                .poll_interval
                .unwrap_or(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)),
            per_page: self.per_page.unwrap_or(DEFAULT_PER_PAGE),
            page_delay: self
                .page_delay
                .unwrap_or(Duration::from_millis(DEFAULT_PAGE_DELAY_MS)),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
            database_path: self
                .database_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_builder_defaults() {
        let config = SyncEngineConfig::builder().api_token("tok").build().unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.per_page, 50);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.page_delay, Duration::from_millis(200));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.database_path, PathBuf::from("sync.db"));
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_builder_requires_token() {
        let err = SyncEngineConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("API token is required"));
    }

    #[test]
    fn test_blank_token_rejected() {
        let result = SyncEngineConfig::builder().api_token("   ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let config = SyncEngineConfig::builder()
            .api_token("tok")
            .base_url("http://localhost:8080/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let result = SyncEngineConfig::builder()
            .api_token("tok")
            .base_url("ftp://example.com")
            .build();
        assert!(result.unwrap_err().to_string().contains("http://"));
    }

    #[test]
    fn test_validate_rejects_page_size_out_of_range() {
        for size in [0, 101] {
            let result = SyncEngineConfig::builder()
                .api_token("tok")
                .per_page(size)
                .build();
            assert!(result.unwrap_err().to_string().contains("Page size"));
        }
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let result = SyncEngineConfig::builder()
            .api_token("tok")
            .poll_interval(Duration::ZERO)
            .build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must be greater than 0"));
    }

    #[test]
    fn test_zero_page_delay_is_allowed() {
        let config = SyncEngineConfig::builder()
            .api_token("tok")
            .page_delay(Duration::ZERO)
            .build()
            .unwrap();
        assert!(config.page_delay.is_zero());
    }

    #[test]
    fn test_debug_hides_token() {
        let config = SyncEngineConfig::builder()
            .api_token("super-secret")
            .build()
            .unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_lookup_reads_all_fields() {
        let config = SyncEngineConfig::from_lookup(lookup_from(&[
            ("SYNC_API_BASE_URL", "http://127.0.0.1:3000"),
            ("SYNC_API_TOKEN", "tok"),
            ("UPDATE_INTERVAL_MS", "5000"),
            ("SYNC_PAGE_SIZE", "10"),
            ("SYNC_PAGE_DELAY_MS", "0"),
            ("SYNC_REQUEST_TIMEOUT_MS", "1500"),
            ("SYNC_DATABASE_PATH", "/tmp/members.db"),
            ("SYNC_LOG_LEVEL", "debug"),
            ("SYNC_LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.per_page, 10);
        assert_eq!(config.page_delay, Duration::ZERO);
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.database_path, PathBuf::from("/tmp/members.db"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_lookup_falls_back_to_legacy_token() {
        let config =
            SyncEngineConfig::from_lookup(lookup_from(&[("V2_PRODUCTS_TOKEN", "legacy")]))
                .unwrap();
        assert_eq!(config.api_token, "legacy");
    }

    #[test]
    fn test_from_lookup_prefers_primary_token() {
        let config = SyncEngineConfig::from_lookup(lookup_from(&[
            ("SYNC_API_TOKEN", "primary"),
            ("V2_PRODUCTS_TOKEN", "legacy"),
        ]))
        .unwrap();
        assert_eq!(config.api_token, "primary");
    }

    #[test]
    fn test_from_lookup_rejects_garbage_numbers() {
        let err = SyncEngineConfig::from_lookup(lookup_from(&[
            ("SYNC_API_TOKEN", "tok"),
            ("UPDATE_INTERVAL_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("UPDATE_INTERVAL_MS"));
    }

    #[test]
    fn test_from_lookup_ignores_blank_values() {
        let config = SyncEngineConfig::from_lookup(lookup_from(&[
            ("SYNC_API_TOKEN", "tok"),
            ("SYNC_PAGE_SIZE", "  "),
        ]))
        .unwrap();
        assert_eq!(config.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_from_lookup_rejects_unknown_log_level() {
        let result = SyncEngineConfig::from_lookup(lookup_from(&[
            ("SYNC_API_TOKEN", "tok"),
            ("SYNC_LOG_LEVEL", "chatty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = SyncEngineConfig::builder().api_token("tok").build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.base_url, config.base_url);
    }
}
