//! Inputs a fallback strategy may need to recover.

use futures::future::BoxFuture;
use mender_abstraction::AiError;
use mender_cache::{CacheKey, EnhancementCache};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by an [`Operation`].
pub type OperationFuture = BoxFuture<'static, Result<Value, AiError>>;

/// A re-runnable AI operation, e.g. "call the image backend with this prompt".
pub type Operation = Arc<dyn Fn() -> OperationFuture + Send + Sync>;

/// Wraps an async closure as an [`Operation`].
pub fn operation<F, Fut>(f: F) -> Operation
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, AiError>> + Send + 'static,
{
    Arc::new(move || -> OperationFuture { Box::pin(f()) })
}

/// Everything a strategy can draw on besides the error itself.
///
/// RETRY reads `operation`, ALTERNATIVE_MODEL reads `alternative`, and
/// CACHED_RESULT reads `cache` with `cache_key`.
#[derive(Clone, Default)]
pub struct RecoveryContext {
    /// The operation that failed.
    pub operation: Option<Operation>,
    /// A substitute operation, usually backed by another model.
    pub alternative: Option<Operation>,
    /// Cache that may hold an earlier result for this request.
    pub cache: Option<Arc<EnhancementCache>>,
    /// Key of the earlier result.
    pub cache_key: Option<CacheKey>,
    /// Free-form values for custom handlers.
    pub values: Map<String, Value>,
}

impl RecoveryContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    #[must_use]
    pub fn with_alternative(mut self, alternative: Operation) -> Self {
        self.alternative = Some(alternative);
        self
    }

    /// Points CACHED_RESULT at `key` in `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<EnhancementCache>, key: CacheKey) -> Self {
        self.cache = Some(cache);
        self.cache_key = Some(key);
        self
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for RecoveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryContext")
            .field("operation", &self.operation.as_ref().map(|_| "<operation>"))
            .field("alternative", &self.alternative.as_ref().map(|_| "<operation>"))
            .field("cache", &self.cache.is_some())
            .field("cache_key", &self.cache_key)
            .field("values", &self.values)
            .finish()
    }
}
