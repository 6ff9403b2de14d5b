//! Error history and recovery statistics.

use mender_abstraction::{AiError, ErrorCategory, ErrorSeverity, FallbackStrategy};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Records returned in [`ErrorStatistics::recent_errors`].
const RECENT_ERRORS: usize = 10;

/// Categories returned by [`ErrorAnalytics::patterns`].
const TOP_PATTERNS: usize = 5;

/// Attempts and outcomes of one fallback strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl StrategyStats {
    /// Fraction of attempts that recovered.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Snapshot returned by `get_error_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorStatistics {
    pub total_errors: u64,
    pub errors_by_category: BTreeMap<ErrorCategory, u64>,
    pub errors_by_severity: BTreeMap<ErrorSeverity, u64>,
    pub recovery_stats: BTreeMap<FallbackStrategy, StrategyStats>,
    /// Most recent errors, oldest first.
    pub recent_errors: Vec<AiError>,
}

/// A category's share of all recorded errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPattern {
    pub category: ErrorCategory,
    pub count: u64,
    /// Share of `total_errors`, in percent.
    pub percentage: f64,
}

/// Counters and bounded history kept by the error handler.
#[derive(Debug)]
pub struct ErrorAnalytics {
    history: VecDeque<AiError>,
    history_size: usize,
    total_errors: u64,
    by_category: BTreeMap<ErrorCategory, u64>,
    by_severity: BTreeMap<ErrorSeverity, u64>,
    recovery: BTreeMap<FallbackStrategy, StrategyStats>,
}

impl ErrorAnalytics {
    /// Creates empty analytics retaining at most `history_size` errors.
    pub fn new(history_size: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(history_size.min(1024)),
            history_size,
            total_errors: 0,
            by_category: BTreeMap::new(),
            by_severity: BTreeMap::new(),
            recovery: BTreeMap::new(),
        }
    }

    /// Counts `error` and appends it to the history, dropping the oldest record when full.
    pub fn record_error(&mut self, error: &AiError) {
        self.total_errors += 1;
        *self.by_category.entry(error.category).or_default() += 1;
        *self.by_severity.entry(error.severity).or_default() += 1;

        if self.history.len() >= self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(error.clone());
    }

    /// Counts one attempt of `strategy` and its outcome.
    pub fn record_recovery(&mut self, strategy: FallbackStrategy, success: bool) {
        let stats = self.recovery.entry(strategy).or_default();
        stats.attempts += 1;
        if success {
            stats.successes += 1;
        } else {
            stats.failures += 1;
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn statistics(&self) -> ErrorStatistics {
        let skip = self.history.len().saturating_sub(RECENT_ERRORS);
        ErrorStatistics {
            total_errors: self.total_errors,
            errors_by_category: self.by_category.clone(),
            errors_by_severity: self.by_severity.clone(),
            recovery_stats: self.recovery.clone(),
            recent_errors: self.history.iter().skip(skip).cloned().collect(),
        }
    }

    /// Most frequent categories, largest first; ties keep category order.
    pub fn patterns(&self) -> Vec<ErrorPattern> {
        let mut counts: Vec<_> = self.by_category.iter().map(|(c, n)| (*c, *n)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(TOP_PATTERNS)
            .map(|(category, count)| ErrorPattern {
                category,
                count,
                percentage: if self.total_errors == 0 {
                    0.0
                } else {
                    count as f64 / self.total_errors as f64 * 100.0
                },
            })
            .collect()
    }

    /// Clears counters and history.
    pub fn reset(&mut self) {
        *self = Self::new(self.history_size);
    }
}
