//! Mender core.
//!
//! Ties the enhancement cache and the error handler together: workspace
//! configuration, tracing setup, and [`ResilientExecutor`], which serves
//! requests from the cache, bounds operations with timeouts, and hands
//! failures to recovery.

pub mod config;
pub mod executor;
pub mod telemetry;

pub use config::{ConfigError, MenderConfig, config_path, load_config};
pub use executor::{EnhancementOutput, EnhancementRequest, ExecutionOutcome, ResilientExecutor};
pub use telemetry::init_tracing;

pub use mender_abstraction::{AiError, ErrorCategory, ErrorSeverity, FallbackStrategy, RecoveredValue};
pub use mender_cache::{CacheConfig, CacheKey, EnhancementCache};
pub use mender_orchestrator::{ErrorHandler, ErrorHandlerConfig, ErrorRecoveryResult, RecoveryContext};
