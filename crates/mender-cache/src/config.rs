//! Configuration for the enhancement cache.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration for the enhancement cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Upper bound on the summed size of all cached blobs (default: 1 GiB).
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// Maximum number of entries (default: 10000).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// TTL applied when `put` is called without one. `None` keeps entries until evicted.
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,

    /// How often the background sweep runs in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Version component of every generated key. Bumping it orphans old entries.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,
}

fn default_max_size_bytes() -> u64 {
    1024 * 1024 * 1024 // 1 GiB
}

fn default_max_entries() -> usize {
    10_000
}

fn default_cleanup_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_cache_version() -> String {
    "1.0".to_string()
}

/// Errors that can occur during cache configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheConfigError {
    /// Invalid max size (must be > 0).
    #[error("Invalid max size: must be greater than 0")]
    InvalidMaxSize,

    /// Invalid max entries (must be > 0).
    #[error("Invalid max entries: must be greater than 0")]
    InvalidMaxEntries,

    /// Invalid cleanup interval (must be > 0).
    #[error("Invalid cleanup interval: must be greater than 0")]
    InvalidCleanupInterval,

    /// Cache version must not be empty.
    #[error("Invalid cache version: must not be empty")]
    EmptyVersion,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            max_entries: default_max_entries(),
            default_ttl_secs: None,
            cleanup_interval_secs: default_cleanup_interval_secs(),
            cache_version: default_cache_version(),
        }
    }
}

impl CacheConfig {
    /// Creates a default configuration bounded to `max_size_bytes`.
    #[must_use]
    pub fn with_max_size(max_size_bytes: u64) -> Self {
        Self { max_size_bytes, ..Self::default() }
    }

    /// Validate the cache configuration.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.max_size_bytes == 0 {
            return Err(CacheConfigError::InvalidMaxSize);
        }

        if self.max_entries == 0 {
            return Err(CacheConfigError::InvalidMaxEntries);
        }

        if self.cleanup_interval_secs == 0 {
            return Err(CacheConfigError::InvalidCleanupInterval);
        }

        if self.cache_version.trim().is_empty() {
            return Err(CacheConfigError::EmptyVersion);
        }

        Ok(())
    }

    /// Get the cleanup interval as a Duration.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Get the default TTL as a Duration.
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.default_ttl_secs, None);
        assert_eq!(config.cleanup_interval_secs, 300);
        assert_eq!(config.cache_version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_validation_invalid_max_size() {
        let config = CacheConfig::with_max_size(0);
        assert_eq!(config.validate(), Err(CacheConfigError::InvalidMaxSize));
    }

    #[test]
    fn test_cache_config_validation_invalid_max_entries() {
        let config = CacheConfig { max_entries: 0, ..CacheConfig::default() };
        assert_eq!(config.validate(), Err(CacheConfigError::InvalidMaxEntries));
    }

    #[test]
    fn test_cache_config_validation_invalid_cleanup_interval() {
        let config = CacheConfig { cleanup_interval_secs: 0, ..CacheConfig::default() };
        assert_eq!(config.validate(), Err(CacheConfigError::InvalidCleanupInterval));
    }

    #[test]
    fn test_cache_config_validation_empty_version() {
        let config = CacheConfig { cache_version: "  ".to_string(), ..CacheConfig::default() };
        assert_eq!(config.validate(), Err(CacheConfigError::EmptyVersion));
    }

    #[test]
    fn test_cache_config_partial_deserialize() {
        let json = r#"{"max_size_bytes": 4096, "default_ttl_secs": 60}"#;
        let config: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_size_bytes, 4096);
        assert_eq!(config.default_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
    }
}
