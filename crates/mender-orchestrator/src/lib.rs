//! Error recovery orchestrator for Mender.
//!
//! Classifies failures raised by AI operations, picks a fallback strategy for
//! each, and runs it: a caller-registered handler when one is bound, otherwise
//! a built-in. Retry-with-backoff and timeout-with-extension helpers are usable
//! on their own.

pub mod analytics;
pub mod classifier;
pub mod config;
pub mod context;
pub mod handler;
pub mod registry;
pub mod retry;
pub mod timeout;

pub use analytics::{ErrorAnalytics, ErrorPattern, ErrorStatistics, StrategyStats};
pub use classifier::{ErrorClassifier, default_severity};
pub use config::{ErrorHandlerConfig, HandlerConfigError};
pub use context::{Operation, OperationFuture, RecoveryContext, operation};
pub use handler::{ErrorHandler, ErrorRecoveryResult, RecoveryPhase};
pub use registry::{FallbackHandler, FallbackRegistry, FnHandler, handler_fn};
pub use retry::{RetryOutcome, RetryPolicy, run_with_retry};
pub use timeout::{TimeoutPolicy, run_with_timeout};

// Shared error model, re-exported so callers need one dependency.
pub use mender_abstraction::{AiError, ErrorCategory, ErrorSeverity, FallbackStrategy, RecoveredValue};
