//! Workspace configuration.
//!
//! Settings live in `.mender/config.toml` under the workspace root:
//!
//! ```toml
//! [cache]
//! max_size_bytes = 536870912
//! default_ttl_secs = 3600
//!
//! [error_handler]
//! max_retries = 5
//! enable_cpu_fallback = false
//! ```
//!
//! Both tables are optional; missing fields take their defaults.

use mender_cache::{CacheConfig, CacheConfigError};
use mender_orchestrator::{ErrorHandlerConfig, HandlerConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Directory holding Mender's per-workspace files.
pub const CONFIG_DIR: &str = ".mender";

/// Name of the configuration file inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid cache settings.
    #[error("Invalid cache configuration: {0}")]
    Cache(#[from] CacheConfigError),

    /// Invalid error handler settings.
    #[error("Invalid error handler configuration: {0}")]
    ErrorHandler(#[from] HandlerConfigError),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for the cache and the error handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MenderConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub error_handler: ErrorHandlerConfig,
}

impl MenderConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.error_handler.validate()?;
        Ok(())
    }
}

/// Path of the configuration file for `workspace_root`.
pub fn config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Loads and validates the configuration for `workspace_root`.
///
/// A missing file yields the defaults.
pub fn load_config(workspace_root: &Path) -> Result<MenderConfig> {
    let path = config_path(workspace_root);

    let config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        let config = MenderConfig::from_toml(&content)
            .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        debug!(path = %path.display(), "Loaded configuration");
        config
    } else {
        debug!(path = %path.display(), "No configuration file, using defaults");
        MenderConfig::default()
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        let config_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config, MenderConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[cache]
max_size_bytes = 1024
default_ttl_secs = 60

[error_handler]
max_retries = 5
enable_cpu_fallback = false
"#,
        );

        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.cache.max_size_bytes, 1024);
        assert_eq!(config.cache.default_ttl_secs, Some(60));
        assert_eq!(config.cache.max_entries, CacheConfig::default().max_entries);
        assert_eq!(config.error_handler.max_retries, 5);
        assert!(!config.error_handler.enable_cpu_fallback);
        assert!(config.error_handler.enable_cached_fallback);
    }

    #[test]
    fn test_only_one_table() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[error_handler]\nexponential_backoff = false\n");

        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.cache, CacheConfig::default());
        assert!(!config.error_handler.exponential_backoff);
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[cache\nmax_size_bytes = ");
        assert!(matches!(load_config(dir.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validation_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[cache]\nmax_size_bytes = 0\n");
        assert!(matches!(
            load_config(dir.path()),
            Err(ConfigError::Cache(CacheConfigError::InvalidMaxSize))
        ));

        write_config(&dir, "[error_handler]\ntimeout_extension_factor = 0.5\n");
        assert!(matches!(
            load_config(dir.path()),
            Err(ConfigError::ErrorHandler(HandlerConfigError::InvalidExtensionFactor))
        ));
    }

    #[test]
    fn test_config_path() {
        let path = config_path(Path::new("/work"));
        assert_eq!(path, PathBuf::from("/work/.mender/config.toml"));
    }
}
