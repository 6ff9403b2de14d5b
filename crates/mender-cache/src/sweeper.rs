//! Periodic removal of expired entries, independent of read traffic.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::{CacheState, lock};

/// Handle to a running sweep task.
#[derive(Debug)]
pub(crate) struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweep loop on `runtime`.
    pub(crate) fn spawn(
        runtime: &Handle,
        state: Arc<Mutex<CacheState>>,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = runtime.spawn(async move {
            info!(interval_secs = interval.as_secs_f64(), "Cache sweep started");
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        let removed = lock(&state).remove_expired(Utc::now());
                        if removed > 0 {
                            debug!(removed, "Sweep removed expired cache entries");
                        }
                    }
                }
            }
            info!("Cache sweep stopped");
        });
        Self { token, handle }
    }

    /// Requests the loop to stop at its next sleep boundary.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the loop and waits for it to exit.
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            error!("Cache sweep task failed: {}", e);
        }
    }
}
