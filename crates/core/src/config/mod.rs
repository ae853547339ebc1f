//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PAGECACHE_*)
//! 2. TOML config file (if PAGECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::{LazyStore, OpenMode};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PAGECACHE_*)
/// 2. TOML config file (if PAGECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite store.
    ///
    /// Set via PAGECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How the store file is opened.
    ///
    /// Set via PAGECACHE_OPEN_MODE (`create`, `existing`, `read_only`, `truncate`).
    #[serde(default)]
    pub open_mode: OpenMode,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PAGECACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via PAGECACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PAGECACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects the origin follows.
    ///
    /// Set via PAGECACHE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Default number of in-flight requests for bulk fetches.
    ///
    /// Set via PAGECACHE_CONCURRENCY environment variable.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Half-life in seconds for pages without a dedicated treatment.
    ///
    /// Set via PAGECACHE_DEFAULT_HALF_LIFE_SECS environment variable.
    #[serde(default = "default_half_life_secs")]
    pub default_half_life_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pagecache.sqlite")
}

fn default_user_agent() -> String {
    "pagecache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_concurrency() -> usize {
    10
}

fn default_half_life_secs() -> u64 {
    2 * 24 * 60 * 60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            open_mode: OpenMode::default(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            concurrency: default_concurrency(),
            default_half_life_secs: default_half_life_secs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Default half-life as Duration.
    pub fn default_half_life(&self) -> Duration {
        Duration::from_secs(self.default_half_life_secs)
    }

    /// A lazily opened store at the configured path and mode.
    pub fn store(&self) -> LazyStore {
        LazyStore::new(self.db_path.clone(), self.open_mode)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PAGECACHE_`
    /// 2. TOML file from `PAGECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAGECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PAGECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./pagecache.sqlite"));
        assert_eq!(config.open_mode, OpenMode::Create);
        assert_eq!(config.user_agent, "pagecache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.default_half_life_secs, 172_800);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.default_half_life(), Duration::from_secs(2 * 24 * 3600));
    }

    #[test]
    fn test_extract_toml_overrides() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(
            r#"
                db_path = "/tmp/pages.sqlite"
                open_mode = "existing"
                concurrency = 4
            "#,
        ));

        let config = AppConfig::extract(figment).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/pages.sqlite"));
        assert_eq!(config.open_mode, OpenMode::Existing);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.user_agent, "pagecache/0.1");
    }

    #[test]
    fn test_extract_rejects_invalid_values() {
        let figment =
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string("concurrency = 0"));

        let result = AppConfig::extract(figment);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "concurrency"));
    }

    #[test]
    fn test_extract_rejects_unknown_mode() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(r#"open_mode = "sometimes""#));

        assert!(matches!(AppConfig::extract(figment), Err(ConfigError::LoadFailed(_))));
    }

    #[test]
    fn test_store_is_lazy() {
        let config = AppConfig { db_path: PathBuf::from("/nonexistent/dir/pages.sqlite"), ..Default::default() };
        let store = config.store();
        assert!(!store.is_open());
    }
}
