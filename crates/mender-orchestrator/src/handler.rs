//! The error handler: classification, strategy selection, and recovery.

use mender_abstraction::{AiError, ErrorSeverity, FallbackStrategy, RecoveredValue};
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::analytics::{ErrorAnalytics, ErrorPattern, ErrorStatistics};
use crate::config::{ErrorHandlerConfig, HandlerConfigError};
use crate::context::RecoveryContext;
use crate::registry::{FallbackHandler, FallbackRegistry};
use crate::retry::{RetryPolicy, run_with_retry};
use crate::timeout::{TimeoutPolicy, run_with_timeout};

/// Stages one error passes through inside [`ErrorHandler::handle_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    Raised,
    Classified,
    StrategySelected,
    ExecutingFallback,
    Recovered,
    Failed,
}

impl RecoveryPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raised => "raised",
            Self::Classified => "classified",
            Self::StrategySelected => "strategy_selected",
            Self::ExecutingFallback => "executing_fallback",
            Self::Recovered => "recovered",
            Self::Failed => "failed",
        }
    }
}

/// Result of a recovery attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecoveryResult {
    pub success: bool,
    /// Strategy that was attempted, whether or not it recovered.
    pub strategy_used: FallbackStrategy,
    /// Recovered payload when `success` is true.
    pub result: Option<RecoveredValue>,
    /// The original error when `success` is false.
    pub error: Option<AiError>,
    /// Why the fallback itself failed.
    pub fallback_error: Option<String>,
    pub recovery_time_ms: f64,
    /// Operation invocations made while recovering.
    pub attempts: u32,
}

impl ErrorRecoveryResult {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Recovers from AI operation failures.
///
/// Owns its configuration, its custom handler registry, and its analytics;
/// one instance is shared by everything that feeds it errors.
#[derive(Debug)]
pub struct ErrorHandler {
    config: ErrorHandlerConfig,
    registry: RwLock<FallbackRegistry>,
    analytics: Mutex<ErrorAnalytics>,
}

impl ErrorHandler {
    /// Creates a handler after validating `config`.
    ///
    /// # Errors
    /// Returns `HandlerConfigError` if the configuration is invalid.
    pub fn new(config: ErrorHandlerConfig) -> Result<Self, HandlerConfigError> {
        config.validate()?;
        info!(
            max_retries = config.max_retries,
            default_timeout_secs = config.default_timeout_secs,
            "Error handler initialized"
        );
        Ok(Self {
            analytics: Mutex::new(ErrorAnalytics::new(config.error_history_size)),
            registry: RwLock::new(FallbackRegistry::new()),
            config,
        })
    }

    pub fn config(&self) -> &ErrorHandlerConfig {
        &self.config
    }

    /// Binds a custom handler to `strategy`, replacing any earlier one.
    pub fn register_handler(
        &self,
        strategy: FallbackStrategy,
        handler: Arc<dyn FallbackHandler>,
    ) -> Option<Arc<dyn FallbackHandler>> {
        debug!(strategy = %strategy, "Registering fallback handler");
        self.registry.write().unwrap_or_else(PoisonError::into_inner).register(strategy, handler)
    }

    /// Restores the built-in behaviour of `strategy`.
    pub fn unregister_handler(&self, strategy: FallbackStrategy) -> Option<Arc<dyn FallbackHandler>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner).unregister(strategy)
    }

    /// Attempts to recover from `error`. Never fails; check `success`.
    pub async fn handle_error(
        &self,
        error: AiError,
        context: &RecoveryContext,
    ) -> ErrorRecoveryResult {
        let started = Instant::now();
        log_error(&error);
        self.analytics().record_error(&error);
        trace_phase(RecoveryPhase::Classified, &error);

        let strategy = error.fallback_strategy();
        debug!(strategy = %strategy, phase = RecoveryPhase::StrategySelected.as_str(), "Selected fallback strategy");

        let custom = self.registry.read().unwrap_or_else(PoisonError::into_inner).get(strategy);
        trace_phase(RecoveryPhase::ExecutingFallback, &error);
        let (outcome, attempts) = match custom {
            Some(handler) => (handler.handle(&error, context).await, 0),
            None => self.execute_builtin(strategy, &error, context).await,
        };

        let success = outcome.is_ok();
        self.analytics().record_recovery(strategy, success);
        let recovery_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(value) => {
                info!(
                    strategy = %strategy,
                    category = %error.category,
                    recovery_time_ms,
                    phase = RecoveryPhase::Recovered.as_str(),
                    "Recovered from error"
                );
                ErrorRecoveryResult {
                    success: true,
                    strategy_used: strategy,
                    result: Some(value),
                    error: None,
                    fallback_error: None,
                    recovery_time_ms,
                    attempts,
                }
            }
            Err(fallback_error) => {
                warn!(
                    strategy = %strategy,
                    category = %error.category,
                    fallback_error = %fallback_error.message,
                    phase = RecoveryPhase::Failed.as_str(),
                    "Fallback strategy failed"
                );
                ErrorRecoveryResult {
                    success: false,
                    strategy_used: strategy,
                    result: None,
                    error: Some(error),
                    fallback_error: Some(fallback_error.to_string()),
                    recovery_time_ms,
                    attempts,
                }
            }
        }
    }

    async fn execute_builtin(
        &self,
        strategy: FallbackStrategy,
        error: &AiError,
        context: &RecoveryContext,
    ) -> (Result<RecoveredValue, AiError>, u32) {
        match strategy {
            FallbackStrategy::Retry => {
                let Some(operation) = context.operation.clone() else {
                    return (Err(unavailable("retry", "no operation supplied for retry")), 0);
                };
                let policy = RetryPolicy::from_config(&self.config, None);
                let outcome = run_with_retry(&policy, || operation(), |_| true).await;
                (outcome.result.map(RecoveredValue::Value), outcome.attempts)
            }
            FallbackStrategy::CpuFallback => (self.cpu_fallback(error), 0),
            FallbackStrategy::LowerQuality => (self.lower_quality(error), 0),
            FallbackStrategy::AlternativeModel => match context.alternative.clone() {
                Some(alternative) => (alternative().await.map(RecoveredValue::Value), 1),
                None => (Err(unavailable("alternative_model", "no alternative model supplied")), 0),
            },
            FallbackStrategy::CachedResult => (self.cached_result(context), 0),
            FallbackStrategy::Skip => (Ok(RecoveredValue::Skipped), 0),
            FallbackStrategy::GracefulDegradation => (
                Ok(RecoveredValue::degraded(
                    "Operation unavailable, continuing with reduced functionality",
                    &[("error", Value::String(error.message.clone()))],
                )),
                0,
            ),
        }
    }

    fn cpu_fallback(&self, error: &AiError) -> Result<RecoveredValue, AiError> {
        if !self.config.enable_cpu_fallback {
            return Err(unavailable("cpu_fallback", "CPU fallback is disabled"));
        }
        Ok(RecoveredValue::degraded(
            "Switched to CPU processing",
            &[("device", json!("cpu")), ("reason", Value::String(error.message.clone()))],
        ))
    }

    fn lower_quality(&self, error: &AiError) -> Result<RecoveredValue, AiError> {
        if !self.config.enable_quality_degradation {
            return Err(unavailable("lower_quality", "quality degradation is disabled"));
        }
        let mut fields = vec![("quality", json!("reduced"))];
        if let Some(timeout) = error.timeout_seconds() {
            fields.push(("timeout_seconds", json!(timeout)));
        }
        Ok(RecoveredValue::degraded("Using reduced quality settings", &fields))
    }

    fn cached_result(&self, context: &RecoveryContext) -> Result<RecoveredValue, AiError> {
        if !self.config.enable_cached_fallback {
            return Err(unavailable("cached_result", "cached fallback is disabled"));
        }
        let (Some(cache), Some(key)) = (context.cache.as_ref(), context.cache_key.as_ref()) else {
            return Err(unavailable("cached_result", "no cache or cache key supplied"));
        };
        // The caller already counted this lookup when its own read missed.
        cache
            .peek(key)
            .map(|(data, metadata)| RecoveredValue::Cached { data, metadata })
            .ok_or_else(|| {
                AiError::configuration(format!("no cached result for {key}"))
                    .with_component("error_handler")
                    .with_operation("cached_result")
            })
    }

    /// Runs `operation` until it succeeds or the retry budget runs out.
    ///
    /// `max_retries` overrides the configured count.
    ///
    /// # Errors
    /// Returns the last error once attempts are exhausted.
    pub async fn handle_with_retry<T, F, Fut>(
        &self,
        operation: F,
        max_retries: Option<u32>,
    ) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        self.handle_with_retry_if(operation, max_retries, |_| true).await
    }

    /// Like [`Self::handle_with_retry`], but gives up at once on errors `should_retry` rejects.
    ///
    /// # Errors
    /// Returns the first rejected error, or the last error once attempts are exhausted.
    pub async fn handle_with_retry_if<T, F, Fut, P>(
        &self,
        operation: F,
        max_retries: Option<u32>,
        should_retry: P,
    ) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
        P: Fn(&AiError) -> bool,
    {
        let policy = RetryPolicy::from_config(&self.config, max_retries);
        let outcome = run_with_retry(&policy, operation, should_retry).await;
        if let Err(e) = &outcome.result {
            warn!(attempts = outcome.attempts, error = %e, "Operation failed after retries");
        }
        outcome.result
    }

    /// Waits for `future`, extending the deadline when allowed.
    ///
    /// Falls back to the configured default timeout when `timeout` is `None`.
    /// Extensions apply only when both `allow_extension` and the configuration permit them.
    ///
    /// # Errors
    /// Returns the future's own error, or a TIMEOUT `AiError` carrying the final deadline.
    pub async fn handle_with_timeout<T, Fut>(
        &self,
        future: Fut,
        timeout: Option<Duration>,
        allow_extension: bool,
    ) -> Result<T, AiError>
    where
        Fut: Future<Output = Result<T, AiError>>,
    {
        run_with_timeout(self.timeout_policy(timeout, allow_extension), future).await
    }

    fn timeout_policy(&self, timeout: Option<Duration>, allow_extension: bool) -> TimeoutPolicy {
        let timeout = timeout.unwrap_or_else(|| self.config.default_timeout());
        if allow_extension && self.config.enable_timeout_extension {
            TimeoutPolicy {
                timeout,
                max_extensions: self.config.max_timeout_extensions,
                extension_factor: self.config.timeout_extension_factor,
            }
        } else {
            TimeoutPolicy::fixed(timeout)
        }
    }

    pub fn get_error_statistics(&self) -> ErrorStatistics {
        self.analytics().statistics()
    }

    /// Top categories by frequency.
    pub fn get_error_patterns(&self) -> Vec<ErrorPattern> {
        self.analytics().patterns()
    }

    pub fn reset_statistics(&self) {
        self.analytics().reset();
        debug!("Error statistics reset");
    }

    fn analytics(&self) -> MutexGuard<'_, ErrorAnalytics> {
        self.analytics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unavailable(operation: &str, message: &str) -> AiError {
    AiError::configuration(message).with_component("error_handler").with_operation(operation)
}

fn log_error(error: &AiError) {
    let phase = RecoveryPhase::Raised.as_str();
    match error.severity {
        ErrorSeverity::Low => info!(
            category = %error.category,
            component = %error.component,
            operation = %error.operation,
            phase,
            "{}", error.message
        ),
        ErrorSeverity::Medium => warn!(
            category = %error.category,
            component = %error.component,
            operation = %error.operation,
            phase,
            "{}", error.message
        ),
        ErrorSeverity::High | ErrorSeverity::Critical => error!(
            category = %error.category,
            severity = ?error.severity,
            component = %error.component,
            operation = %error.operation,
            phase,
            "{}", error.message
        ),
    }
}

fn trace_phase(phase: RecoveryPhase, error: &AiError) {
    debug!(phase = phase.as_str(), category = %error.category, "Recovery phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::operation;
    use mender_abstraction::ErrorCategory;

    fn handler() -> ErrorHandler {
        ErrorHandler::new(ErrorHandlerConfig { retry_delay_secs: 0.001, ..Default::default() })
            .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ErrorHandlerConfig { error_history_size: 0, ..Default::default() };
        assert_eq!(ErrorHandler::new(config).unwrap_err(), HandlerConfigError::InvalidHistorySize);
    }

    #[tokio::test]
    async fn test_validation_error_is_skipped() {
        let result = handler()
            .handle_error(AiError::validation("prompt too long"), &RecoveryContext::new())
            .await;
        assert!(result.success);
        assert_eq!(result.strategy_used, FallbackStrategy::Skip);
        assert_eq!(result.result, Some(RecoveredValue::Skipped));
    }

    #[tokio::test]
    async fn test_retry_without_operation_fails() {
        let result = handler()
            .handle_error(AiError::inference("sampler crashed"), &RecoveryContext::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.strategy_used, FallbackStrategy::Retry);
        assert_eq!(result.error.unwrap().message, "sampler crashed");
        assert!(result.fallback_error.unwrap().contains("no operation"));
    }

    #[tokio::test]
    async fn test_retry_strategy_reruns_operation() {
        let context = RecoveryContext::new().with_operation(operation(|| async { Ok(json!("second try")) }));
        let result = handler().handle_error(AiError::inference("flaky"), &context).await;
        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.result, Some(RecoveredValue::Value(json!("second try"))));
    }

    #[tokio::test]
    async fn test_alternative_model() {
        let context = RecoveryContext::new()
            .with_alternative(operation(|| async { Ok(json!({"model": "sd-turbo"})) }));
        let result = handler()
            .handle_error(AiError::model_loading("weights missing", "sdxl"), &context)
            .await;
        assert!(result.success);
        assert_eq!(result.strategy_used, FallbackStrategy::AlternativeModel);
    }

    #[tokio::test]
    async fn test_lower_quality_reports_timeout() {
        let error = AiError::timeout("slow", Duration::from_secs(30));
        let result = handler().handle_error(error, &RecoveryContext::new()).await;
        let value = result.result.unwrap();
        assert_eq!(value.as_value().unwrap()["timeout_seconds"], json!(30.0));
        assert!(value.is_fallback());
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let result = handler()
            .handle_error(
                AiError::new("bad key", ErrorCategory::Configuration),
                &RecoveryContext::new(),
            )
            .await;
        let value = result.to_value();
        assert_eq!(value["success"], true);
        assert_eq!(value["strategy_used"], "graceful_degradation");
        assert_eq!(value["result"]["kind"], "value");
    }

    #[test]
    fn test_timeout_policy_respects_config() {
        let handler = ErrorHandler::new(ErrorHandlerConfig {
            enable_timeout_extension: false,
            ..Default::default()
        })
        .unwrap();
        let policy = handler.timeout_policy(None, true);
        assert_eq!(policy.max_extensions, 0);
        assert_eq!(policy.timeout, Duration::from_secs(300));
    }
}
