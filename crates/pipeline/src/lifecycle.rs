//! The job lifecycle engine.
//!
//! Owns all writes to generation job records. Both resolvers re-read the
//! job first and report [`Resolution::AlreadyTerminal`] instead of
//! re-applying side effects, and the underlying UPDATEs are additionally
//! guarded on non-terminal status. The webhook handler and the
//! reconciliation poller can therefore race on the same job and exactly
//! one transition wins.

use std::sync::Arc;

use serde_json::json;

use mirage_cloud::ArtifactStorage;
use mirage_core::billing::RelatedEntity;
use mirage_core::lifecycle::state_machine;
use mirage_core::types::DbId;
use mirage_db::models::generation_job::GenerationJob;
use mirage_db::repositories::{CreditRepo, GenerationJobRepo};
use mirage_db::DbPool;
use mirage_events::{EventBus, SinkEvent};
use mirage_fal::ResultPayload;

use crate::PipelineError;

/// Outcome of a resolve call.
///
/// Explicit so both callers (webhook handler, poller) can branch without
/// relying on error identity: an already-terminal job is an expected
/// no-op, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// This call applied the transition (and its side effects).
    Transitioned,
    /// The job was already `completed` or `failed`; nothing was changed.
    AlreadyTerminal,
}

/// State machine executor for generation jobs.
pub struct LifecycleEngine {
    pool: DbPool,
    storage: Arc<dyn ArtifactStorage>,
    events: Arc<EventBus>,
}

impl LifecycleEngine {
    pub fn new(pool: DbPool, storage: Arc<dyn ArtifactStorage>, events: Arc<EventBus>) -> Self {
        Self {
            pool,
            storage,
            events,
        }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    /// Transition `pending -> processing` once submission is confirmed.
    ///
    /// Returns whether the transition applied. Not load-bearing for
    /// correctness: a webhook may legitimately arrive before this runs.
    pub async fn mark_processing(&self, job_id: DbId) -> Result<bool, PipelineError> {
        Ok(GenerationJobRepo::mark_processing(&self.pool, job_id).await?)
    }

    /// Resolve a job as succeeded with the provider's result payload.
    ///
    /// Persists the artifact into our own storage before touching the job
    /// record: a job is never `completed` without a stored artifact. An
    /// already-terminal job short-circuits before any download happens.
    pub async fn resolve_success(
        &self,
        job_id: DbId,
        result: &ResultPayload,
    ) -> Result<Resolution, PipelineError> {
        let job = self.load(job_id).await?;
        if state_machine::is_terminal(job.status_id) {
            return Ok(Resolution::AlreadyTerminal);
        }

        let artifact = result.artifact().ok_or(PipelineError::MissingArtifact)?;

        let bytes = self.storage.download(&artifact.url).await?;
        let content_type = artifact
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let output_ref = self.storage.store(bytes, content_type).await?;

        let seed = result.seed_string();
        let applied =
            GenerationJobRepo::complete(&self.pool, job_id, &output_ref, seed.as_deref()).await?;

        if !applied {
            // Raced another resolver between the re-read and the update;
            // the artifact download was redundant but harmless.
            tracing::debug!(job_id, "Job reached a terminal state mid-resolve; skipping");
            return Ok(Resolution::AlreadyTerminal);
        }

        tracing::info!(job_id, output_ref = %output_ref, "Generation completed");

        self.events.record(
            SinkEvent::new("generation.completed")
                .with_user(job.user_id)
                .with_payload(json!({ "job_id": job_id, "output_ref": output_ref })),
        );

        Ok(Resolution::Transitioned)
    }

    /// Resolve a job as failed and refund its charge.
    ///
    /// The refund runs synchronously with the failure transition so a user
    /// is never left charged for a job the system has declared failed.
    /// `refund_by_entity` returns `None` when no charge exists (the job
    /// failed before one was taken) or when a refund was already issued.
    pub async fn resolve_failure(
        &self,
        job_id: DbId,
        error_message: &str,
    ) -> Result<Resolution, PipelineError> {
        let job = self.load(job_id).await?;
        if state_machine::is_terminal(job.status_id) {
            return Ok(Resolution::AlreadyTerminal);
        }

        let applied = GenerationJobRepo::fail(&self.pool, job_id, error_message).await?;
        if !applied {
            return Ok(Resolution::AlreadyTerminal);
        }

        let refunded = CreditRepo::refund_by_entity(
            &self.pool,
            RelatedEntity::generation_job(job_id),
            error_message,
        )
        .await?;

        tracing::warn!(
            job_id,
            refunded = refunded.unwrap_or(0),
            error = error_message,
            "Generation failed"
        );

        self.events.record(
            SinkEvent::new("generation.failed")
                .with_user(job.user_id)
                .with_payload(json!({
                    "job_id": job_id,
                    "error": error_message,
                    "refunded": refunded,
                })),
        );

        Ok(Resolution::Transitioned)
    }

    async fn load(&self, job_id: DbId) -> Result<GenerationJob, PipelineError> {
        GenerationJobRepo::find_by_id(&self.pool, job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))
    }
}
