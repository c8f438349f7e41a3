use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

use crate::{BackendFlowApi, BackendReconciler};

/// Starts the tracking reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_tracking_worker(job: BackendReconciler, interval: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🛰️ Tracking reconciliation worker started");
        loop {
            timer.tick().await;
            debug!("🛰️ Running tracking reconciliation pass");
            match job.run_once().await {
                Ok(result) => info!("🛰️ {result}"),
                Err(e) => error!("🛰️ Error running tracking reconciliation pass: {e}"),
            }
        }
    })
}

/// Starts the stale missed-pickup sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_auto_cancel_worker(
    api: BackendFlowApi,
    window: Duration,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Stale missed-pickup sweeper started (window: {window})");
        loop {
            timer.tick().await;
            debug!("🕰️ Running stale missed-pickup sweep");
            match api.auto_cancel_stale_pickup_failures(window).await {
                Ok(result) => {
                    info!(
                        "🕰️ Sweep complete. {} cancelled, {} skipped, {} failed",
                        result.cancelled.len(),
                        result.skipped,
                        result.failed.len()
                    );
                    for (oid, e) in &result.failed {
                        warn!("🕰️ Auto-cancel of order {oid} failed: {e}");
                    }
                },
                Err(e) => error!("🕰️ Error running the stale missed-pickup sweep: {e}"),
            }
        }
    })
}
