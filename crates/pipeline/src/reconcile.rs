//! Reconciliation poller for jobs whose webhook never arrived.
//!
//! Finds jobs stuck in a non-terminal state past a staleness threshold
//! and drives each one to completion through the provider gateway and the
//! lifecycle engine. Safe to run concurrently with the webhook handler:
//! every job is re-read immediately before acting, and the engine's
//! guarded transitions make the loser of any race a no-op.

use std::sync::Arc;

use serde::Serialize;

use mirage_core::lifecycle::state_machine;
use mirage_core::types::DbId;
use mirage_db::repositories::GenerationJobRepo;
use mirage_db::DbPool;
use mirage_fal::QueueStatus;

use crate::{LifecycleEngine, PipelineError, ProviderQueue, Resolution};

/// Age past which a non-terminal job is suspected of a lost webhook.
pub const DEFAULT_STALE_AFTER_MINUTES: i64 = 20;

/// Terminal message for stale jobs that never got a correlation id:
/// there is nothing to poll, so there is nothing to recover.
pub const UNRECOVERABLE_MESSAGE: &str =
    "Generation was never confirmed by the provider and cannot be recovered";

/// Counters describing one reconciliation pass. Reporting only, not part
/// of the consistency contract.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    /// Stale jobs examined.
    pub checked: u32,
    /// Jobs the provider had actually completed; resolved to `completed`.
    pub recovered: u32,
    /// Jobs the provider is still working on; left untouched.
    pub still_in_progress: u32,
    /// Jobs resolved to `failed` (provider-reported, unrecoverable, or
    /// query errors).
    pub failed: u32,
}

/// Drives stale jobs to their true terminal state.
pub struct Reconciler {
    pool: DbPool,
    queue: Arc<dyn ProviderQueue>,
    engine: Arc<LifecycleEngine>,
    stale_after: chrono::Duration,
}

impl Reconciler {
    pub fn new(pool: DbPool, queue: Arc<dyn ProviderQueue>, engine: Arc<LifecycleEngine>) -> Self {
        Self {
            pool,
            queue,
            engine,
            stale_after: chrono::Duration::minutes(DEFAULT_STALE_AFTER_MINUTES),
        }
    }

    /// Override the staleness threshold (used by config and tests).
    pub fn with_stale_after(mut self, stale_after: chrono::Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Run one reconciliation pass, optionally scoped to a single user.
    pub async fn run_once(&self, only_user: Option<DbId>) -> Result<ReconcileReport, PipelineError> {
        let stale = GenerationJobRepo::find_stale(&self.pool, self.stale_after, only_user).await?;

        let mut report = ReconcileReport::default();

        for job in stale {
            report.checked += 1;

            // Re-read immediately before acting: a webhook may have resolved
            // the job between the stale query and this iteration.
            let status = match GenerationJobRepo::status_of(&self.pool, job.id).await? {
                Some(status) => status,
                None => continue,
            };
            if state_machine::is_terminal(status) {
                continue;
            }

            let Some(request_id) = job.request_id.as_deref() else {
                // Submission was never confirmed; nothing to poll.
                self.fail_job(&mut report, job.id, UNRECOVERABLE_MESSAGE).await;
                continue;
            };

            match self.queue.status(&job.model_id, request_id).await {
                Ok(QueueStatus::InProgress) => {
                    // Merely slow, not stuck.
                    report.still_in_progress += 1;
                }
                Ok(QueueStatus::Completed(payload)) => {
                    match self.engine.resolve_success(job.id, &payload).await {
                        Ok(Resolution::Transitioned) => report.recovered += 1,
                        Ok(Resolution::AlreadyTerminal) => {}
                        Err(PipelineError::ArtifactPersist(e)) => {
                            // Leave the job unresolved: it stays stale and is
                            // retried next cycle rather than losing a result
                            // the provider actually produced.
                            tracing::warn!(
                                job_id = job.id,
                                error = %e,
                                "Artifact persistence failed during reconciliation; will retry"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                job_id = job.id,
                                error = %e,
                                "Reconciliation failed to resolve a completed job"
                            );
                        }
                    }
                }
                Ok(QueueStatus::Failed(message)) => {
                    self.fail_job(&mut report, job.id, &message).await;
                }
                Err(e) => {
                    // A query error fails the job immediately (with refund)
                    // rather than leaving it stuck indefinitely.
                    let message = format!("Reconciliation could not query the provider: {e}");
                    self.fail_job(&mut report, job.id, &message).await;
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            recovered = report.recovered,
            still_in_progress = report.still_in_progress,
            failed = report.failed,
            "Reconciliation pass finished"
        );

        Ok(report)
    }

    /// Resolve one job to `failed`, counting only an applied transition.
    async fn fail_job(&self, report: &mut ReconcileReport, job_id: DbId, message: &str) {
        match self.engine.resolve_failure(job_id, message).await {
            Ok(Resolution::Transitioned) => report.failed += 1,
            Ok(Resolution::AlreadyTerminal) => {}
            Err(e) => {
                tracing::error!(job_id, error = %e, "Reconciliation failed to fail a job");
            }
        }
    }
}
