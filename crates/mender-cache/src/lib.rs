//! Enhancement cache for Mender.
//!
//! A content-addressed, size-bounded store for expensive AI results. Entries
//! are keyed by a digest of their input content and parameters, evicted in
//! least-recently-used order when space runs out, and expired by TTL either
//! lazily on read or by an optional background sweep.

pub mod cache;
pub mod config;
pub mod error;
pub mod optimize;
mod sweeper;
pub mod types;

pub use cache::EnhancementCache;
pub use config::{CacheConfig, CacheConfigError};
pub use error::CacheError;
pub use optimize::OptimizationReport;
pub use types::{CacheEntry, CacheKey, CacheStatistics, EntryStatus, EntrySummary};
