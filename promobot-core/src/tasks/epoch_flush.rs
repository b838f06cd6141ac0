// promobot-core/src/tasks/epoch_flush.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::error;

use crate::services::EpochMonitor;

/// Spawns a background task that periodically flushes the epoch monitor's
/// unsaved state to the store. This task and the shutdown hook are the only
/// flush callers.
pub fn spawn_epoch_flush_task(monitor: Arc<EpochMonitor>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            if let Err(e) = monitor.flush(false).await {
                error!("error flushing epoch monitor: {e}");
            }
        }
    })
}
