//! Bounded waiting with optional extensions.

use mender_abstraction::AiError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How long to wait and how far a wait may be stretched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutPolicy {
    /// First deadline.
    pub timeout: Duration,
    /// Extensions allowed after the first deadline passes.
    pub max_extensions: u32,
    /// Multiplier applied to the deadline on each extension.
    pub extension_factor: f64,
}

impl TimeoutPolicy {
    /// Policy that fails at the first deadline.
    pub fn fixed(timeout: Duration) -> Self {
        Self { timeout, max_extensions: 0, extension_factor: 1.0 }
    }
}

/// Waits for `future` under `policy`.
///
/// An expired wait is extended against the same in-flight future; the
/// operation is never restarted. Once extensions run out the future is dropped
/// and a timeout error carrying the final deadline is returned.
///
/// # Errors
/// Returns the future's own error, or a TIMEOUT [`AiError`].
pub async fn run_with_timeout<T, Fut>(policy: TimeoutPolicy, future: Fut) -> Result<T, AiError>
where
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut future = std::pin::pin!(future);
    let mut current = policy.timeout;
    let mut extensions = 0u32;

    loop {
        if let Ok(result) = tokio::time::timeout(current, future.as_mut()).await {
            return result;
        }

        if extensions >= policy.max_extensions {
            break;
        }

        let Ok(extended) = Duration::try_from_secs_f64(current.as_secs_f64() * policy.extension_factor)
        else {
            break;
        };
        extensions += 1;
        debug!(
            extension = extensions,
            previous_ms = current.as_millis(),
            timeout_ms = extended.as_millis(),
            "Extending timeout"
        );
        current = extended;
    }

    warn!(timeout_ms = current.as_millis(), extensions, "Operation timed out");
    Err(AiError::timeout(
        format!("Operation timed out after {:.3}s", current.as_secs_f64()),
        current,
    )
    .with_component("error_handler")
    .with_operation("handle_with_timeout")
    .with_context("extensions", extensions))
}
