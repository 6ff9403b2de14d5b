//! Error types for the enhancement cache.

use thiserror::Error;

use crate::config::CacheConfigError;

/// Errors returned by cache operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The entry alone is larger than the whole cache.
    #[error("Entry of {size_bytes} bytes exceeds cache limit of {max_size_bytes} bytes")]
    EntryTooLarge {
        /// Size of the rejected entry.
        size_bytes: u64,
        /// Configured limit.
        max_size_bytes: u64,
    },

    /// Invalid configuration.
    #[error("Invalid cache configuration: {0}")]
    Config(#[from] CacheConfigError),

    /// The background sweep needs a Tokio runtime.
    #[error("Background sweep requires a running Tokio runtime")]
    NoRuntime,
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
