//! EnhancementCache implementation with size-bounded LRU eviction and TTL expiry.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::optimize::{self, OptimizationReport};
use crate::sweeper::Sweeper;
use crate::types::{CacheEntry, CacheKey, CacheStatistics, EntryStatus, EntrySummary};

/// Entries in recency order plus the statistics describing them.
///
/// Both live under one mutex so size accounting never drifts from the map.
#[derive(Debug)]
pub(crate) struct CacheState {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStatistics,
}

impl CacheState {
    fn new() -> Self {
        Self { entries: LruCache::unbounded(), stats: CacheStatistics::default() }
    }

    fn remove(&mut self, canonical: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(canonical)?;
        self.stats.total_size_bytes -= entry.size_bytes;
        self.stats.entry_count = self.entries.len() as u64;
        Some(entry)
    }

    fn invalidate_keys(&mut self, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            if let Some(mut entry) = self.remove(key) {
                entry.status = EntryStatus::Invalidated;
                self.stats.invalidations += 1;
                removed += 1;
            }
        }
        removed
    }

    /// Drops every entry that must no longer be served.
    pub(crate) fn remove_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        self.invalidate_keys(&expired)
    }
}

pub(crate) fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Content-addressed store for expensive enhancement results.
///
/// Bounded by total blob size and entry count, evicts least-recently-used
/// entries first, and never serves an entry whose TTL has elapsed.
#[derive(Debug)]
pub struct EnhancementCache {
    /// Entries and statistics, shared with the background sweep.
    state: Arc<Mutex<CacheState>>,
    /// Cache configuration.
    config: CacheConfig,
    /// Running background sweep, if started.
    sweeper: Mutex<Option<Sweeper>>,
}

impl EnhancementCache {
    /// Create a new enhancement cache with the given configuration.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if the configuration is invalid.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        info!(
            max_size_bytes = config.max_size_bytes,
            max_entries = config.max_entries,
            "Enhancement cache created"
        );

        Ok(Self {
            state: Arc::new(Mutex::new(CacheState::new())),
            config,
            sweeper: Mutex::new(None),
        })
    }

    /// Derives the key for `content` under this cache's version.
    pub fn generate_cache_key(
        &self,
        content: &[u8],
        enhancement_type: &str,
        parameters: &Value,
    ) -> CacheKey {
        CacheKey::generate(content, enhancement_type, parameters, &self.config.cache_version)
    }

    /// Reads an entry, returning its data and metadata.
    ///
    /// A hit refreshes the entry's recency. An expired entry is removed and
    /// reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<(Bytes, Value)> {
        let canonical = key.to_string();
        let now = Utc::now();
        let mut state = lock(&self.state);
        state.stats.total_requests += 1;

        let expired = state.entries.peek(&canonical).map(|entry| entry.is_expired_at(now));
        match expired {
            None => {
                state.stats.cache_misses += 1;
                debug!(key = %canonical, "Cache miss");
                None
            }
            Some(true) => {
                state.invalidate_keys(std::slice::from_ref(&canonical));
                state.stats.cache_misses += 1;
                debug!(key = %canonical, "Cache entry expired");
                None
            }
            Some(false) => {
                let CacheState { entries, stats } = &mut *state;
                let entry = entries.get_mut(&canonical)?;
                entry.touch();
                stats.cache_hits += 1;
                debug!(key = %canonical, access_count = entry.access_count, "Cache hit");
                Some((entry.data.clone(), entry.metadata.clone()))
            }
        }
    }

    /// Stores `data` under `key`, evicting least-recently-used entries to make room.
    ///
    /// `ttl` falls back to the configured default. Storing an existing key
    /// replaces it.
    ///
    /// # Errors
    /// Returns `CacheError::EntryTooLarge` if `data` alone exceeds the size
    /// limit; nothing is evicted or inserted in that case.
    pub fn put(
        &self,
        key: CacheKey,
        data: impl Into<Bytes>,
        metadata: Value,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let data = data.into();
        let size_bytes = data.len() as u64;
        let max_size_bytes = self.config.max_size_bytes;
        if size_bytes > max_size_bytes {
            warn!(key = %key, size_bytes, max_size_bytes, "Rejected oversized cache entry");
            return Err(CacheError::EntryTooLarge { size_bytes, max_size_bytes });
        }

        let canonical = key.to_string();
        let entry = CacheEntry::new(key, data, metadata, ttl.or_else(|| self.config.default_ttl()));
        let mut state = lock(&self.state);
        state.remove(&canonical);

        while state.stats.total_size_bytes + size_bytes > max_size_bytes
            || state.entries.len() >= self.config.max_entries
        {
            let Some((evicted_key, evicted)) = state.entries.pop_lru() else {
                break;
            };
            state.stats.total_size_bytes -= evicted.size_bytes;
            state.stats.evictions += 1;
            debug!(key = %evicted_key, size_bytes = evicted.size_bytes, "Evicted LRU entry");
        }

        state.entries.put(canonical.clone(), entry);
        state.stats.total_size_bytes += size_bytes;
        state.stats.entry_count = state.entries.len() as u64;
        debug!(key = %canonical, size_bytes, "Cached entry");
        Ok(())
    }

    /// Removes one entry by exact key.
    ///
    /// # Returns
    /// `true` if the entry existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let canonical = key.to_string();
        let removed = lock(&self.state).invalidate_keys(std::slice::from_ref(&canonical)) == 1;
        if removed {
            debug!(key = %canonical, "Invalidated cache entry");
        }
        removed
    }

    /// Removes every entry whose canonical key matches `pattern`.
    ///
    /// `pattern` may contain one `*`; without one it must match exactly.
    ///
    /// # Returns
    /// Number of entries removed.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let mut state = lock(&self.state);
        let matching: Vec<String> = state
            .entries
            .iter()
            .filter(|(key, _)| pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        let removed = state.invalidate_keys(&matching);
        drop(state);
        info!(pattern, removed, "Invalidated cache entries by pattern");
        removed
    }

    /// Whether a servable entry exists, without touching its recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.state)
            .entries
            .peek(&key.to_string())
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Reads a servable entry without recording a request or refreshing its recency.
    ///
    /// Used by recovery paths that look up a key the caller has just missed.
    pub fn peek(&self, key: &CacheKey) -> Option<(Bytes, Value)> {
        lock(&self.state)
            .entries
            .peek(&key.to_string())
            .filter(|entry| !entry.is_expired())
            .map(|entry| (entry.data.clone(), entry.metadata.clone()))
    }

    /// Removes all expired entries now.
    ///
    /// # Returns
    /// Number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let removed = lock(&self.state).remove_expired(Utc::now());
        if removed > 0 {
            debug!(removed, "Removed expired cache entries");
        }
        removed
    }

    /// Scores cache health, suggests tuning, and clears expired entries.
    pub fn optimize(&self) -> OptimizationReport {
        let statistics = self.statistics();
        let hit_rate = statistics.hit_rate();
        let utilization = statistics.utilization(self.config.max_size_bytes);
        let optimization_score = optimize::score(hit_rate, utilization);
        let recommendations = optimize::recommendations(&statistics, utilization);
        let expired_entries_removed = self.cleanup_expired();

        info!(
            optimization_score,
            hit_rate,
            utilization,
            expired_entries_removed,
            "Cache optimization complete"
        );

        OptimizationReport {
            optimization_score,
            hit_rate,
            utilization,
            recommendations,
            expired_entries_removed,
            statistics,
        }
    }

    /// Get current cache statistics.
    ///
    /// # Returns
    /// A snapshot of current cache statistics.
    #[must_use]
    pub fn statistics(&self) -> CacheStatistics {
        lock(&self.state).stats.clone()
    }

    /// The `limit` most-read entries, most-read first.
    pub fn top_entries(&self, limit: usize) -> Vec<EntrySummary> {
        let now = Utc::now();
        let state = lock(&self.state);
        let mut summaries: Vec<EntrySummary> = state
            .entries
            .iter()
            .map(|(key, entry)| EntrySummary {
                key: key.clone(),
                access_count: entry.access_count,
                size_bytes: entry.size_bytes,
                created_at: entry.created_at,
                last_accessed: entry.last_accessed,
                status: entry.effective_status(now),
            })
            .collect();
        drop(state);
        summaries.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        summaries.truncate(limit);
        summaries
    }

    /// Clear all entries from the cache. Counters are kept.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        let cleared_count = state.entries.len();
        state.entries.clear();
        state.stats.total_size_bytes = 0;
        state.stats.entry_count = 0;
        drop(state);
        info!(cleared_count, "Cleared all entries from cache");
    }

    /// Starts the periodic expiry sweep on the current Tokio runtime.
    ///
    /// Does nothing if the sweep is already running.
    ///
    /// # Errors
    /// Returns `CacheError::NoRuntime` when called outside a Tokio runtime.
    pub fn start_cleanup_task(&self) -> Result<()> {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if sweeper.is_some() {
            return Ok(());
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        *sweeper = Some(Sweeper::spawn(
            &handle,
            Arc::clone(&self.state),
            self.config.cleanup_interval(),
        ));
        Ok(())
    }

    /// Signals the sweep to stop and waits for it to finish.
    pub async fn stop_cleanup_task(&self) {
        let sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
    }

    /// Whether the background sweep is running.
    pub fn is_cleanup_running(&self) -> bool {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Get the cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Drop for EnhancementCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            sweeper.cancel();
        }
    }
}

/// Prefix/suffix match around a single `*`; exact match without one.
fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            key.len() >= prefix.len() + suffix.len()
                && key.starts_with(prefix)
                && key.ends_with(suffix)
        }
        None => key == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(name: &str) -> CacheKey {
        CacheKey::new(name, "upscale", "params", "1.0")
    }

    fn small_cache(max_size_bytes: u64) -> EnhancementCache {
        EnhancementCache::new(CacheConfig::with_max_size(max_size_bytes)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = EnhancementCache::new(CacheConfig::with_max_size(0));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_get_miss_counts_request() {
        let cache = small_cache(100);
        assert!(cache.get(&key("missing")).is_none());
        let stats = cache.statistics();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 0);
    }

    #[test]
    fn test_peek_leaves_statistics_untouched() {
        let cache = small_cache(100);
        assert!(cache.peek(&key("missing")).is_none());
        cache.put(key("a"), b"data".to_vec(), json!({"w": 1}), None).unwrap();

        let (data, metadata) = cache.peek(&key("a")).unwrap();
        assert_eq!(data, Bytes::from_static(b"data"));
        assert_eq!(metadata, json!({"w": 1}));

        let stats = cache.statistics();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.cache_misses, 0);
        assert_eq!(cache.top_entries(1)[0].access_count, 0);
    }

    #[test]
    fn test_peek_skips_expired_entry() {
        let cache = small_cache(100);
        cache.put(key("a"), b"data".to_vec(), Value::Null, Some(Duration::ZERO)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.peek(&key("a")).is_none());
        assert_eq!(cache.statistics().invalidations, 0);
    }

    #[test]
    fn test_hit_updates_bookkeeping() {
        let cache = small_cache(100);
        cache.put(key("a"), b"data".to_vec(), json!({"w": 1}), None).unwrap();
        cache.get(&key("a")).unwrap();
        cache.get(&key("a")).unwrap();
        let top = cache.top_entries(1);
        assert_eq!(top[0].access_count, 2);
        assert_eq!(top[0].status, EntryStatus::Valid);
        assert_eq!(cache.statistics().cache_hits, 2);
    }

    #[test]
    fn test_put_replaces_existing_key() {
        let cache = small_cache(100);
        cache.put(key("a"), vec![0u8; 40], Value::Null, None).unwrap();
        cache.put(key("a"), vec![0u8; 10], json!("v2"), None).unwrap();
        let stats = cache.statistics();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size_bytes, 10);
        assert_eq!(stats.evictions, 0);
        assert_eq!(cache.get(&key("a")).unwrap().1, json!("v2"));
    }

    #[test]
    fn test_oversized_put_rejected_without_eviction() {
        let cache = small_cache(10);
        cache.put(key("a"), vec![0u8; 5], Value::Null, None).unwrap();
        let result = cache.put(key("big"), vec![0u8; 11], Value::Null, None);
        assert_eq!(
            result,
            Err(CacheError::EntryTooLarge { size_bytes: 11, max_size_bytes: 10 })
        );
        let stats = cache.statistics();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.evictions, 0);
        assert!(cache.contains(&key("a")));
    }

    #[test]
    fn test_read_refreshes_recency() {
        let cache = small_cache(30);
        cache.put(key("a"), vec![0u8; 10], Value::Null, None).unwrap();
        cache.put(key("b"), vec![0u8; 10], Value::Null, None).unwrap();
        cache.put(key("c"), vec![0u8; 10], Value::Null, None).unwrap();
        cache.get(&key("a")).unwrap();
        cache.put(key("d"), vec![0u8; 10], Value::Null, None).unwrap();
        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert_eq!(cache.statistics().evictions, 1);
    }

    #[test]
    fn test_max_entries_enforced() {
        let config = CacheConfig { max_entries: 2, ..CacheConfig::default() };
        let cache = EnhancementCache::new(config).unwrap();
        for name in ["a", "b", "c"] {
            cache.put(key(name), b"x".to_vec(), Value::Null, None).unwrap();
        }
        assert_eq!(cache.statistics().entry_count, 2);
        assert!(!cache.contains(&key("a")));
    }

    #[test]
    fn test_invalidate() {
        let cache = small_cache(100);
        cache.put(key("a"), b"x".to_vec(), Value::Null, None).unwrap();
        assert!(cache.invalidate(&key("a")));
        assert!(!cache.invalidate(&key("a")));
        let stats = cache.statistics();
        assert_eq!(stats.invalidations, 1);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.total_size_bytes, 0);
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("a:*", "a:1"));
        assert!(pattern_matches("*:1.0", "abc:upscale:p:1.0"));
        assert!(pattern_matches("abc:*:1.0", "abc:upscale:p:1.0"));
        assert!(!pattern_matches("abc:*:2.0", "abc:upscale:p:1.0"));
        assert!(!pattern_matches("ab*ba", "aba"));
        assert!(pattern_matches("exact", "exact"));
        assert!(!pattern_matches("exact", "exactly"));
        assert!(pattern_matches("*", "anything"));
    }

    #[test]
    fn test_invalidate_by_pattern_on_enhancement_type() {
        let cache = small_cache(100);
        cache.put(CacheKey::new("h1", "upscale", "p", "1.0"), b"x".to_vec(), Value::Null, None).unwrap();
        cache.put(CacheKey::new("h2", "upscale", "p", "1.0"), b"x".to_vec(), Value::Null, None).unwrap();
        cache.put(CacheKey::new("h3", "caption", "p", "1.0"), b"x".to_vec(), Value::Null, None).unwrap();
        assert_eq!(cache.invalidate_by_pattern("*:upscale:p:1.0"), 2);
        assert_eq!(cache.statistics().entry_count, 1);
        assert_eq!(cache.invalidate_by_pattern("nothing:*"), 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let cache = small_cache(100);
        cache.put(key("short"), b"x".to_vec(), Value::Null, Some(Duration::from_millis(20))).unwrap();
        cache.put(key("long"), b"y".to_vec(), Value::Null, None).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(!cache.contains(&key("short")));
        assert_eq!(cache.cleanup_expired(), 1);
        let stats = cache.statistics();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.invalidations, 1);
    }

    #[test]
    fn test_default_ttl_applies() {
        let config = CacheConfig { default_ttl_secs: Some(0), ..CacheConfig::default() };
        let cache = EnhancementCache::new(config).unwrap();
        cache.put(key("a"), b"x".to_vec(), Value::Null, None).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_optimize_reports_and_cleans() {
        let cache = small_cache(100);
        cache.put(key("a"), vec![0u8; 60], Value::Null, None).unwrap();
        cache.put(key("gone"), vec![0u8; 1], Value::Null, Some(Duration::from_millis(10))).unwrap();
        for _ in 0..4 {
            cache.get(&key("a")).unwrap();
        }
        cache.get(&key("missing"));
        std::thread::sleep(Duration::from_millis(30));

        let report = cache.optimize();
        assert!((report.hit_rate - 0.8).abs() < 1e-9);
        assert!((report.utilization - 0.61).abs() < 1e-9);
        assert!((report.optimization_score - 1.0).abs() < 1e-9);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.expired_entries_removed, 1);
        assert_eq!(cache.statistics().entry_count, 1);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = small_cache(100);
        cache.put(key("a"), b"x".to_vec(), Value::Null, None).unwrap();
        cache.get(&key("a"));
        cache.clear();
        let stats = cache.statistics();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.total_size_bytes, 0);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn test_start_cleanup_outside_runtime() {
        let cache = small_cache(100);
        assert_eq!(cache.start_cleanup_task(), Err(CacheError::NoRuntime));
        assert!(!cache.is_cleanup_running());
    }
}
