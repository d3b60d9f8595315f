//! Periodic reconciliation of stale generation jobs.
//!
//! Spawns a background task that runs one reconciliation pass on a fixed
//! interval using `tokio::time::interval`. The webhook handler is the
//! fast path; this loop is the fallback that converges jobs whose
//! webhook was delayed, duplicated, or lost.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mirage_pipeline::Reconciler;

/// Run the reconciliation loop.
///
/// Executes a full (unscoped) pass every `interval_secs` seconds until
/// `cancel` is triggered. A failing pass is logged and retried on the
/// next tick; it never takes the loop down.
pub async fn run(reconciler: Arc<Reconciler>, interval_secs: u64, cancel: CancellationToken) {
    tracing::info!(interval_secs, "Reconciliation loop started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconciliation loop stopping");
                break;
            }
            _ = interval.tick() => {
                match reconciler.run_once(None).await {
                    Ok(report) => {
                        if report.checked > 0 {
                            tracing::info!(
                                checked = report.checked,
                                recovered = report.recovered,
                                still_in_progress = report.still_in_progress,
                                failed = report.failed,
                                "Reconciliation: stale jobs processed"
                            );
                        } else {
                            tracing::debug!("Reconciliation: no stale jobs");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Reconciliation pass failed");
                    }
                }
            }
        }
    }
}
