//! Fallback strategies.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorCategory;

/// A named remediation applied when an operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Run the same operation again with backoff.
    Retry,
    /// Produce a CPU-mode result instead of a GPU one.
    CpuFallback,
    /// Produce a reduced-quality result.
    LowerQuality,
    /// Run an alternative operation (usually a different model).
    AlternativeModel,
    /// Serve a previously cached result for the same request.
    CachedResult,
    /// Omit the operation entirely.
    Skip,
    /// Produce a minimal descriptive result.
    GracefulDegradation,
}

impl FallbackStrategy {
    /// All strategies, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Retry,
        Self::CpuFallback,
        Self::LowerQuality,
        Self::AlternativeModel,
        Self::CachedResult,
        Self::Skip,
        Self::GracefulDegradation,
    ];

    /// Default strategy for a category when the error suggests none.
    pub const fn default_for(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::ModelLoading => Self::AlternativeModel,
            ErrorCategory::Inference | ErrorCategory::Unknown => Self::Retry,
            ErrorCategory::ResourceExhaustion => Self::CpuFallback,
            ErrorCategory::Timeout => Self::LowerQuality,
            ErrorCategory::Validation => Self::Skip,
            ErrorCategory::Network => Self::CachedResult,
            ErrorCategory::Configuration => Self::GracefulDegradation,
        }
    }

    /// Stable snake_case name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::CpuFallback => "cpu_fallback",
            Self::LowerQuality => "lower_quality",
            Self::AlternativeModel => "alternative_model",
            Self::CachedResult => "cached_result",
            Self::Skip => "skip",
            Self::GracefulDegradation => "graceful_degradation",
        }
    }
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        assert_eq!(
            FallbackStrategy::default_for(ErrorCategory::ModelLoading),
            FallbackStrategy::AlternativeModel
        );
        assert_eq!(FallbackStrategy::default_for(ErrorCategory::Inference), FallbackStrategy::Retry);
        assert_eq!(
            FallbackStrategy::default_for(ErrorCategory::ResourceExhaustion),
            FallbackStrategy::CpuFallback
        );
        assert_eq!(
            FallbackStrategy::default_for(ErrorCategory::Timeout),
            FallbackStrategy::LowerQuality
        );
        assert_eq!(FallbackStrategy::default_for(ErrorCategory::Validation), FallbackStrategy::Skip);
        assert_eq!(
            FallbackStrategy::default_for(ErrorCategory::Network),
            FallbackStrategy::CachedResult
        );
        assert_eq!(
            FallbackStrategy::default_for(ErrorCategory::Configuration),
            FallbackStrategy::GracefulDegradation
        );
        assert_eq!(FallbackStrategy::default_for(ErrorCategory::Unknown), FallbackStrategy::Retry);
    }

    #[test]
    fn test_display_matches_serde() {
        for strategy in FallbackStrategy::ALL {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy));
        }
    }
}
