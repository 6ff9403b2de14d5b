//! Cache health scoring and tuning recommendations.

use serde::Serialize;

use crate::types::CacheStatistics;

const HIT_RATE_BAND: (f64, f64) = (0.70, 0.90);
const UTILIZATION_BAND: (f64, f64) = (0.40, 0.80);
const HIT_RATE_WEIGHT: f64 = 0.6;
const UTILIZATION_WEIGHT: f64 = 0.4;

/// Outcome of [`EnhancementCache::optimize`](crate::EnhancementCache::optimize).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    /// Weighted health score in `[0, 1]`.
    pub optimization_score: f64,
    /// Hits over requests.
    pub hit_rate: f64,
    /// Held bytes over the size limit.
    pub utilization: f64,
    /// Human-readable tuning advice.
    pub recommendations: Vec<String>,
    /// Expired entries removed while optimizing.
    pub expired_entries_removed: usize,
    /// Statistics at the time of scoring.
    pub statistics: CacheStatistics,
}

/// 1.0 inside `[low, high]`; linear decay to 0 below and to 0.5 at 1.0 above.
fn band_score(value: f64, (low, high): (f64, f64)) -> f64 {
    let score = if value < low {
        value / low
    } else if value > high {
        1.0 - 0.5 * (value - high) / (1.0 - high)
    } else {
        1.0
    };
    score.clamp(0.0, 1.0)
}

pub(crate) fn score(hit_rate: f64, utilization: f64) -> f64 {
    HIT_RATE_WEIGHT * band_score(hit_rate, HIT_RATE_BAND)
        + UTILIZATION_WEIGHT * band_score(utilization, UTILIZATION_BAND)
}

pub(crate) fn recommendations(stats: &CacheStatistics, utilization: f64) -> Vec<String> {
    let mut advice = Vec::new();
    if utilization > 0.9 {
        advice.push(format!(
            "Cache is {:.0}% full; increase max_size_bytes to reduce evictions",
            utilization * 100.0
        ));
    } else if utilization < 0.3 {
        advice.push(format!(
            "Cache is only {:.0}% full; max_size_bytes can be reduced",
            utilization * 100.0
        ));
    }
    if stats.total_requests > 0 && stats.hit_rate() < 0.5 {
        advice.push(format!(
            "Hit rate is {:.0}%; raise the TTL or the cache size",
            stats.hit_rate() * 100.0
        ));
    }
    advice
}
