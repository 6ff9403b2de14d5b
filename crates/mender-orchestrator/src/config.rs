//! Configuration for the error handler.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Tunables for retries, timeouts, fallback families, and analytics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorHandlerConfig {
    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay before a retry in seconds (default: 1.0).
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,

    /// Upper bound on a single retry delay in seconds (default: 60.0).
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: f64,

    /// Double the delay after every failed attempt (default: true).
    #[serde(default = "default_true")]
    pub exponential_backoff: bool,

    /// Allow the CPU fallback strategy.
    #[serde(default = "default_true")]
    pub enable_cpu_fallback: bool,

    /// Allow the lower-quality strategy.
    #[serde(default = "default_true")]
    pub enable_quality_degradation: bool,

    /// Allow serving stale results from the cache.
    #[serde(default = "default_true")]
    pub enable_cached_fallback: bool,

    /// Timeout used when a caller passes none, in seconds (default: 300.0).
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: f64,

    /// Keep waiting on a slow operation instead of failing at the first timeout.
    #[serde(default = "default_true")]
    pub enable_timeout_extension: bool,

    /// How many times one wait may be extended (default: 2).
    #[serde(default = "default_max_timeout_extensions")]
    pub max_timeout_extensions: u32,

    /// Multiplier applied to the timeout on each extension (default: 1.5).
    #[serde(default = "default_timeout_extension_factor")]
    pub timeout_extension_factor: f64,

    /// Errors retained for analytics (default: 1000).
    #[serde(default = "default_error_history_size")]
    pub error_history_size: usize,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> f64 {
    1.0
}

fn default_max_retry_delay_secs() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> f64 {
    300.0 // 5 minutes
}

fn default_max_timeout_extensions() -> u32 {
    2
}

fn default_timeout_extension_factor() -> f64 {
    1.5
}

fn default_error_history_size() -> usize {
    1000
}

/// Errors that can occur during error handler configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerConfigError {
    /// Retry delays must be finite and non-negative, with the cap above the base.
    #[error("Invalid retry delay: {0}")]
    InvalidRetryDelay(String),

    /// Invalid default timeout (must be > 0).
    #[error("Invalid default timeout: must be greater than 0")]
    InvalidTimeout,

    /// Invalid extension factor (must be > 1).
    #[error("Invalid timeout extension factor: must be greater than 1")]
    InvalidExtensionFactor,

    /// Invalid history size (must be > 0).
    #[error("Invalid error history size: must be greater than 0")]
    InvalidHistorySize,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
            exponential_backoff: true,
            enable_cpu_fallback: true,
            enable_quality_degradation: true,
            enable_cached_fallback: true,
            default_timeout_secs: default_timeout_secs(),
            enable_timeout_extension: true,
            max_timeout_extensions: default_max_timeout_extensions(),
            timeout_extension_factor: default_timeout_extension_factor(),
            error_history_size: default_error_history_size(),
        }
    }
}

impl ErrorHandlerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `HandlerConfigError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), HandlerConfigError> {
        if !self.retry_delay_secs.is_finite() || self.retry_delay_secs < 0.0 {
            return Err(HandlerConfigError::InvalidRetryDelay(
                "retry_delay_secs must be a non-negative number".to_string(),
            ));
        }

        if !self.max_retry_delay_secs.is_finite()
            || self.max_retry_delay_secs < self.retry_delay_secs
        {
            return Err(HandlerConfigError::InvalidRetryDelay(
                "max_retry_delay_secs must be at least retry_delay_secs".to_string(),
            ));
        }

        if !self.default_timeout_secs.is_finite() || self.default_timeout_secs <= 0.0 {
            return Err(HandlerConfigError::InvalidTimeout);
        }

        if !self.timeout_extension_factor.is_finite() || self.timeout_extension_factor <= 1.0 {
            return Err(HandlerConfigError::InvalidExtensionFactor);
        }

        if self.error_history_size == 0 {
            return Err(HandlerConfigError::InvalidHistorySize);
        }

        Ok(())
    }

    /// Get the base retry delay as a Duration.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_delay_secs).unwrap_or(Duration::ZERO)
    }

    /// Get the retry delay cap as a Duration.
    #[must_use]
    pub fn max_retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_retry_delay_secs).unwrap_or(Duration::MAX)
    }

    /// Get the default timeout as a Duration.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_timeout_secs).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ErrorHandlerConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.exponential_backoff);
        assert!(config.enable_cached_fallback);
        assert_eq!(config.max_timeout_extensions, 2);
        assert_eq!(config.error_history_size, 1000);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.default_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_retry_delay() {
        let config = ErrorHandlerConfig { retry_delay_secs: -1.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(HandlerConfigError::InvalidRetryDelay(_))));

        let config = ErrorHandlerConfig {
            retry_delay_secs: 5.0,
            max_retry_delay_secs: 1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HandlerConfigError::InvalidRetryDelay(_))));
    }

    #[test]
    fn test_config_validation_invalid_timeout() {
        let config = ErrorHandlerConfig { default_timeout_secs: 0.0, ..Default::default() };
        assert_eq!(config.validate(), Err(HandlerConfigError::InvalidTimeout));
    }

    #[test]
    fn test_config_validation_invalid_extension_factor() {
        let config = ErrorHandlerConfig { timeout_extension_factor: 1.0, ..Default::default() };
        assert_eq!(config.validate(), Err(HandlerConfigError::InvalidExtensionFactor));
    }

    #[test]
    fn test_config_validation_invalid_history_size() {
        let config = ErrorHandlerConfig { error_history_size: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(HandlerConfigError::InvalidHistorySize));
    }

    #[test]
    fn test_config_partial_deserialize() {
        let json = r#"{"max_retries": 5, "exponential_backoff": false, "enable_cpu_fallback": false}"#;
        let config: ErrorHandlerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_retries, 5);
        assert!(!config.exponential_backoff);
        assert!(!config.enable_cpu_fallback);
        assert!(config.enable_quality_degradation);
        assert!((config.timeout_extension_factor - 1.5).abs() < f64::EPSILON);
    }
}
