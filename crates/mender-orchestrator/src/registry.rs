//! Caller-registered fallback handlers.

use async_trait::async_trait;
use mender_abstraction::{AiError, FallbackStrategy, RecoveredValue};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::RecoveryContext;

/// Replaces the built-in behaviour of one fallback strategy.
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    /// Attempts recovery from `error`.
    ///
    /// # Errors
    /// Returns an `AiError` when this handler cannot recover either.
    async fn handle(
        &self,
        error: &AiError,
        context: &RecoveryContext,
    ) -> Result<RecoveredValue, AiError>;
}

/// Adapts an async closure to [`FallbackHandler`].
///
/// The closure receives owned copies of the error and context.
pub struct FnHandler<F>(pub F);

/// Boxes an async closure as a shareable [`FallbackHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn FallbackHandler>
where
    F: Fn(AiError, RecoveryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RecoveredValue, AiError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[async_trait]
impl<F, Fut> FallbackHandler for FnHandler<F>
where
    F: Fn(AiError, RecoveryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RecoveredValue, AiError>> + Send + 'static,
{
    async fn handle(
        &self,
        error: &AiError,
        context: &RecoveryContext,
    ) -> Result<RecoveredValue, AiError> {
        (self.0)(error.clone(), context.clone()).await
    }
}

/// Custom handlers keyed by strategy, owned by one error handler.
#[derive(Default, Clone)]
pub struct FallbackRegistry {
    handlers: HashMap<FallbackStrategy, Arc<dyn FallbackHandler>>,
}

impl FallbackRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `strategy`, returning the handler it replaces.
    pub fn register(
        &mut self,
        strategy: FallbackStrategy,
        handler: Arc<dyn FallbackHandler>,
    ) -> Option<Arc<dyn FallbackHandler>> {
        self.handlers.insert(strategy, handler)
    }

    /// Removes the handler bound to `strategy`.
    pub fn unregister(&mut self, strategy: FallbackStrategy) -> Option<Arc<dyn FallbackHandler>> {
        self.handlers.remove(&strategy)
    }

    /// Handler bound to `strategy`, if any.
    pub fn get(&self, strategy: FallbackStrategy) -> Option<Arc<dyn FallbackHandler>> {
        self.handlers.get(&strategy).cloned()
    }

    /// Whether `strategy` has a custom handler.
    pub fn contains(&self, strategy: FallbackStrategy) -> bool {
        self.handlers.contains_key(&strategy)
    }

    /// Strategies with custom handlers, in declaration order.
    pub fn strategies(&self) -> Vec<FallbackStrategy> {
        FallbackStrategy::ALL
            .into_iter()
            .filter(|strategy| self.handlers.contains_key(strategy))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackRegistry").field("strategies", &self.strategies()).finish()
    }
}
