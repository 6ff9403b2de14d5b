//! Tracing setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "mender=info";

/// Installs the global tracing subscriber.
///
/// Reads `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Emits JSON lines when
/// `json` is set. Returns `false` if a subscriber was already installed.
pub fn init_tracing(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init().is_ok()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_tracing(false);
        assert!(!init_tracing(true));
    }
}
