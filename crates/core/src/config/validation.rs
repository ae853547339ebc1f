//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Upper bound on bulk fetch concurrency.
pub const MAX_CONCURRENCY: usize = 64;

/// Upper bound on the default half-life: ten years.
pub const MAX_HALF_LIFE_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `concurrency` is 0 or exceeds [`MAX_CONCURRENCY`]
    /// - `default_half_life_secs` is 0 or exceeds [`MAX_HALF_LIFE_SECS`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid {
                field: "concurrency".into(),
                reason: format!("must be between 1 and {MAX_CONCURRENCY}"),
            });
        }

        if self.default_half_life_secs == 0 || self.default_half_life_secs > MAX_HALF_LIFE_SECS {
            return Err(ConfigError::Invalid {
                field: "default_half_life_secs".into(),
                reason: format!("must be between 1 and {MAX_HALF_LIFE_SECS}"),
            });
        }

        if self.open_mode.is_read_only() {
            tracing::warn!(
                db_path = %self.db_path.display(),
                "store opened read-only; cache misses and bulk fetches will fail with STORE_IO"
            );
        }

        Ok(())
    }
}
