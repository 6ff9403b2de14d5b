//! Cache-first, timeout-bounded execution with recovery.

use bytes::Bytes;
use mender_abstraction::{AiError, ErrorCategory, RecoveredValue};
use mender_cache::{CacheKey, EnhancementCache};
use mender_orchestrator::{
    ErrorClassifier, ErrorHandler, ErrorRecoveryResult, Operation, RecoveryContext,
};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One enhancement to run: the input plus the knobs that shape its output.
#[derive(Debug, Clone)]
pub struct EnhancementRequest {
    /// Raw input, e.g. image bytes or a prompt.
    pub content: Bytes,
    /// What is being done to the content, e.g. `upscale`.
    pub enhancement_type: String,
    /// Parameters that change the output.
    pub parameters: Value,
    /// Overrides the configured default timeout.
    pub timeout: Option<Duration>,
    /// Overrides the cache's default TTL for the stored result.
    pub ttl: Option<Duration>,
}

impl EnhancementRequest {
    pub fn new(content: impl Into<Bytes>, enhancement_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            content: content.into(),
            enhancement_type: enhancement_type.into(),
            parameters,
            timeout: None,
            ttl: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Output of an enhancement operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementOutput {
    pub data: Bytes,
    pub metadata: Value,
}

impl EnhancementOutput {
    pub fn new(data: impl Into<Bytes>, metadata: Value) -> Self {
        Self { data: data.into(), metadata }
    }
}

/// How a request was satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Served from the cache without running the operation.
    CacheHit(EnhancementOutput),
    /// The operation succeeded and its output was cached.
    Completed(EnhancementOutput),
    /// The operation failed; this is what recovery produced.
    Recovered(ErrorRecoveryResult),
}

impl ExecutionOutcome {
    /// Whether the caller has a usable result.
    pub fn is_success(&self) -> bool {
        match self {
            Self::CacheHit(_) | Self::Completed(_) => true,
            Self::Recovered(result) => result.success,
        }
    }
}

/// Runs AI operations through the cache and the error handler.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    cache: Arc<EnhancementCache>,
    handler: Arc<ErrorHandler>,
    classifier: ErrorClassifier,
    retry: bool,
}

impl ResilientExecutor {
    pub fn new(cache: Arc<EnhancementCache>, handler: Arc<ErrorHandler>) -> Self {
        Self { cache, handler, classifier: ErrorClassifier::new(), retry: false }
    }

    /// Retries failed operations with the handler's backoff before recovering.
    #[must_use]
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &Arc<EnhancementCache> {
        &self.cache
    }

    pub fn handler(&self) -> &Arc<ErrorHandler> {
        &self.handler
    }

    /// Cache key for `request`.
    pub fn cache_key(&self, request: &EnhancementRequest) -> CacheKey {
        self.cache
            .generate_cache_key(&request.content, &request.enhancement_type, &request.parameters)
    }

    /// Serves `request` from the cache, or runs `operation` and caches its output.
    ///
    /// Failures go to the error handler with the cache and key in the recovery
    /// context, so a NETWORK failure can still be answered from an earlier run,
    /// and with `operation` itself, so RETRY can run it again. Output produced
    /// by a successful retry is cached and returned as a cached blob.
    pub async fn execute<F, Fut>(&self, request: &EnhancementRequest, operation: F) -> ExecutionOutcome
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EnhancementOutput, AiError>> + Send + 'static,
    {
        let key = self.cache_key(request);
        if let Some((data, metadata)) = self.cache.get(&key) {
            debug!(key = %key, "Serving cached enhancement");
            return ExecutionOutcome::CacheHit(EnhancementOutput { data, metadata });
        }

        let operation = Arc::new(operation);
        let attempt = || self.handler.handle_with_timeout(operation(), request.timeout, true);
        let result = if self.retry {
            self.handler.handle_with_retry(attempt, None).await
        } else {
            attempt().await
        };

        match result {
            Ok(output) => {
                self.store(&key, &output, request.ttl);
                info!(
                    key = %key,
                    enhancement_type = %request.enhancement_type,
                    size_bytes = output.data.len(),
                    "Enhancement completed"
                );
                ExecutionOutcome::Completed(output)
            }
            Err(error) => {
                let error = error
                    .with_component("resilient_executor")
                    .with_context("enhancement_type", request.enhancement_type.clone());
                let retried = Arc::new(Mutex::new(None));
                let context = RecoveryContext::new()
                    .with_operation(self.recovery_operation(operation, request.timeout, Arc::clone(&retried)))
                    .with_cache(Arc::clone(&self.cache), key.clone())
                    .with_value("enhancement_type", request.enhancement_type.clone());

                let mut recovery = self.handler.handle_error(error, &context).await;
                let output = retried.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let (true, Some(output)) = (recovery.success, output) {
                    self.store(&key, &output, request.ttl);
                    recovery.result =
                        Some(RecoveredValue::Cached { data: output.data, metadata: output.metadata });
                }
                ExecutionOutcome::Recovered(recovery)
            }
        }
    }

    /// Like [`Self::execute`], for operations that fail with foreign error types.
    ///
    /// Their errors are classified by message before recovery.
    pub async fn execute_classified<F, Fut, E>(
        &self,
        request: &EnhancementRequest,
        operation: F,
    ) -> ExecutionOutcome
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EnhancementOutput, E>> + Send + 'static,
        E: std::error::Error,
    {
        let classifier = self.classifier;
        self.execute(request, move || {
            let fut = operation();
            async move { fut.await.map_err(|e| classifier.classify(&e)) }
        })
        .await
    }

    /// Wraps `operation` for the RETRY strategy.
    ///
    /// Each run is bounded like the first attempt. The latest successful output
    /// lands in `slot`; the recovered value carries its metadata.
    fn recovery_operation<F, Fut>(
        &self,
        operation: Arc<F>,
        timeout: Option<Duration>,
        slot: Arc<Mutex<Option<EnhancementOutput>>>,
    ) -> Operation
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EnhancementOutput, AiError>> + Send + 'static,
    {
        let handler = Arc::clone(&self.handler);
        mender_orchestrator::operation(move || {
            let handler = Arc::clone(&handler);
            let operation = Arc::clone(&operation);
            let slot = Arc::clone(&slot);
            async move {
                let output = handler.handle_with_timeout(operation(), timeout, true).await?;
                let metadata = output.metadata.clone();
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
                Ok(metadata)
            }
        })
    }

    fn store(&self, key: &CacheKey, output: &EnhancementOutput, ttl: Option<Duration>) {
        if let Err(e) = self.cache.put(key.clone(), output.data.clone(), output.metadata.clone(), ttl) {
            warn!(key = %key, error = %e, "Failed to cache enhancement output");
        }
    }

    /// Category an operation error would be recovered under.
    pub fn classify(&self, error: &dyn std::error::Error) -> ErrorCategory {
        self.classifier.classify(error).category
    }
}
