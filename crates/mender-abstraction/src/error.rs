//! Error taxonomy for failed AI operations.
//!
//! An [`AiError`] is a plain value: building one never fails, and callers match
//! on its [`ErrorCategory`] and [`ErrorSeverity`] instead of on a type
//! hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::strategy::FallbackStrategy;

/// What kind of infrastructure concern failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Model weights or pipeline could not be loaded.
    ModelLoading,
    /// The model failed while producing output.
    Inference,
    /// Memory, GPU, or disk ran out.
    ResourceExhaustion,
    /// The operation did not finish in time.
    Timeout,
    /// Input was rejected.
    Validation,
    /// A remote backend could not be reached.
    Network,
    /// The system is misconfigured.
    Configuration,
    /// Anything else.
    Unknown,
}

impl ErrorCategory {
    /// All categories, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::ModelLoading,
        Self::Inference,
        Self::ResourceExhaustion,
        Self::Timeout,
        Self::Validation,
        Self::Network,
        Self::Configuration,
        Self::Unknown,
    ];

    /// Stable snake_case name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ModelLoading => "model_loading",
            Self::Inference => "inference",
            Self::ResourceExhaustion => "resource_exhaustion",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Configuration => "configuration",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How loudly an error is logged. Never used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Expected and harmless.
    Low,
    /// Worth a warning.
    Medium,
    /// The request will likely degrade.
    High,
    /// The subsystem is unusable.
    Critical,
}

impl ErrorSeverity {
    /// Stable snake_case name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed AI operation, described well enough to pick a remedy.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{category} error in {component}/{operation}: {message}")]
pub struct AiError {
    /// Human-readable description.
    pub message: String,
    /// What kind of failure this is.
    pub category: ErrorCategory,
    /// Logging emphasis.
    pub severity: ErrorSeverity,
    /// Component that raised the error (e.g. "image_generator").
    pub component: String,
    /// Operation that was running (e.g. "generate").
    pub operation: String,
    /// When the error was created.
    pub timestamp: DateTime<Utc>,
    /// Free-form diagnostic fields.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Display form of the underlying error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_cause: Option<String>,
    /// Remedy the raiser recommends; overrides the category default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fallback: Option<FallbackStrategy>,
}

impl AiError {
    /// Context key under which timeout errors record their timeout.
    pub const TIMEOUT_SECONDS_KEY: &'static str = "timeout_seconds";

    /// Creates an error of the given category with medium severity.
    pub fn new(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            category,
            severity: ErrorSeverity::Medium,
            component: "unknown".to_string(),
            operation: "unknown".to_string(),
            timestamp: Utc::now(),
            context: Map::new(),
            original_cause: None,
            suggested_fallback: None,
        }
    }

    /// Model loading failed; suggests switching to an alternative model.
    pub fn model_loading(message: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::ModelLoading)
            .with_severity(ErrorSeverity::High)
            .with_context("model_name", model_name.into())
            .with_suggested_fallback(FallbackStrategy::AlternativeModel)
    }

    /// Inference failed.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Inference)
    }

    /// A resource ran out; suggests CPU fallback.
    pub fn resource_exhaustion(message: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::ResourceExhaustion)
            .with_severity(ErrorSeverity::High)
            .with_context("resource_type", resource.into())
            .with_suggested_fallback(FallbackStrategy::CpuFallback)
    }

    /// The operation exceeded `timeout`; suggests a lower-quality result.
    pub fn timeout(message: impl Into<String>, timeout: Duration) -> Self {
        Self::new(message, ErrorCategory::Timeout)
            .with_context(Self::TIMEOUT_SECONDS_KEY, timeout.as_secs_f64())
            .with_suggested_fallback(FallbackStrategy::LowerQuality)
    }

    /// Input was invalid; suggests skipping the operation.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Validation)
            .with_severity(ErrorSeverity::Low)
            .with_suggested_fallback(FallbackStrategy::Skip)
    }

    /// A remote backend was unreachable.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Network)
    }

    /// The system is misconfigured.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Configuration).with_severity(ErrorSeverity::High)
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Adds one diagnostic field.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Records the display form of the underlying error.
    #[must_use]
    pub fn with_cause(mut self, cause: &dyn std::error::Error) -> Self {
        self.original_cause = Some(cause.to_string());
        self
    }

    #[must_use]
    pub fn with_suggested_fallback(mut self, strategy: FallbackStrategy) -> Self {
        self.suggested_fallback = Some(strategy);
        self
    }

    /// The timeout recorded by [`AiError::timeout`], in seconds.
    pub fn timeout_seconds(&self) -> Option<f64> {
        self.context.get(Self::TIMEOUT_SECONDS_KEY).and_then(Value::as_f64)
    }

    /// The strategy that should handle this error.
    pub fn fallback_strategy(&self) -> FallbackStrategy {
        self.suggested_fallback
            .unwrap_or_else(|| FallbackStrategy::default_for(self.category))
    }

    /// Plain JSON record for external analytics.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_error_defaults() {
        let err = AiError::new("boom", ErrorCategory::Unknown);
        assert_eq!(err.severity, ErrorSeverity::Medium);
        assert_eq!(err.component, "unknown");
        assert!(err.suggested_fallback.is_none());
        assert_eq!(err.fallback_strategy(), FallbackStrategy::Retry);
    }

    #[test]
    fn test_suggested_fallback_overrides_category() {
        let err = AiError::network("unreachable").with_suggested_fallback(FallbackStrategy::Skip);
        assert_eq!(err.fallback_strategy(), FallbackStrategy::Skip);
    }

    #[test]
    fn test_timeout_records_seconds() {
        let err = AiError::timeout("too slow", Duration::from_millis(2500));
        assert_eq!(err.category, ErrorCategory::Timeout);
        assert_eq!(err.timeout_seconds(), Some(2.5));
        assert_eq!(err.fallback_strategy(), FallbackStrategy::LowerQuality);
    }

    #[test]
    fn test_specialised_constructors() {
        let err = AiError::model_loading("weights missing", "sdxl");
        assert_eq!(err.severity, ErrorSeverity::High);
        assert_eq!(err.context["model_name"], "sdxl");
        assert_eq!(err.fallback_strategy(), FallbackStrategy::AlternativeModel);

        let err = AiError::resource_exhaustion("CUDA out of memory", "gpu");
        assert_eq!(err.fallback_strategy(), FallbackStrategy::CpuFallback);

        let err = AiError::validation("empty prompt");
        assert_eq!(err.severity, ErrorSeverity::Low);
        assert_eq!(err.fallback_strategy(), FallbackStrategy::Skip);
    }

    #[test]
    fn test_display_and_cause() {
        let io = std::io::Error::other("socket closed");
        let err = AiError::network("fetch failed")
            .with_component("video_generator")
            .with_operation("render")
            .with_cause(&io);
        assert_eq!(err.to_string(), "network error in video_generator/render: fetch failed");
        assert_eq!(err.original_cause.as_deref(), Some("socket closed"));
    }

    #[test]
    fn test_to_value_fields() {
        let err = AiError::inference("nan in logits").with_context("step", 12);
        let value = err.to_value();
        assert_eq!(value["category"], "inference");
        assert_eq!(value["severity"], "medium");
        assert_eq!(value["context"]["step"], 12);
        assert!(value.get("suggested_fallback").is_none());
    }
}
