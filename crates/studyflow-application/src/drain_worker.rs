//! Background queue drain task.
//!
//! Runs as a periodic timer task, not a dedicated thread. Overlapping runs
//! are already no-ops at the queue level (single-flight mutex), so a tick
//! that fires while a user-triggered flush is still in progress simply
//! skips.

use std::sync::Arc;
use std::time::Duration;
use studyflow_infrastructure::{DurableQueue, RemoteEndpoint};
use tokio::task::JoinHandle;

/// Handle to the periodic drain task; dropping it stops the task.
pub struct DrainWorker {
    handle: JoinHandle<()>,
}

impl DrainWorker {
    /// Spawns a task that drains `queue` against `endpoint` every `interval`.
    pub fn spawn(
        queue: Arc<DurableQueue>,
        endpoint: Arc<dyn RemoteEndpoint>,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a fresh worker
            // does not race the submission that just enqueued.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = queue.drain(endpoint.as_ref()).await {
                    tracing::warn!("background drain failed: {e}");
                }
            }
        });
        Self { handle }
    }

    /// Stops the background task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for DrainWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
