//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache records, leaving
//! documents with a running activation alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheRecordStore;
use crate::inflight::InFlightTracker;
use crate::tasks::DEFAULT_SWEEP_INTERVAL_SECS;

/// Spawns a task that sweeps expired records every `interval`.
///
/// Each pass pins the identifiers currently in flight, then removes the
/// remaining expired records in one batch. A zero `interval` is replaced by
/// the default. The returned handle should be aborted at shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweeper_task(store.clone(), inflight.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweeper_task(
    store: Arc<RwLock<CacheRecordStore>>,
    inflight: Arc<Mutex<InFlightTracker>>,
    interval: Duration,
) -> JoinHandle<()> {
    let interval = if interval.is_zero() {
        warn!("Zero sweep interval, using the default");
        Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)
    } else {
        interval
    };

    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs_f64(), "Starting expiry sweeper");

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let inflight = inflight.lock().await;
                let pinned = inflight.document_ids();
                let mut store = store.write().await;
                store.sweep_expired(&pinned)
            };

            if removed > 0 {
                info!(removed, "Expiry sweep removed records");
            } else {
                debug!("Expiry sweep found nothing to remove");
            }
        }
    })
}
