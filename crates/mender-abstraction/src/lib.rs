//! Shared vocabulary for Mender.
//!
//! This crate defines the error taxonomy used to describe failed AI operations,
//! the fallback strategies the orchestrator can apply, and the value shape a
//! recovered operation hands back to its caller.

pub mod error;
pub mod strategy;
pub mod value;

pub use error::{AiError, ErrorCategory, ErrorSeverity};
pub use strategy::FallbackStrategy;
pub use value::RecoveredValue;
