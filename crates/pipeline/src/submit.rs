//! The submit unit of work.
//!
//! Creating the pending job record and debiting the ledger commit in one
//! database transaction; only then is the request handed to the provider.
//! A provider rejection refunds the charge immediately and leaves the job
//! `pending`, so the system never stays charged for a job that never
//! reached the provider's queue.

use serde_json::json;

use mirage_core::billing::{model_cost, RelatedEntity, TX_GENERATION_CHARGE};
use mirage_core::types::DbId;
use mirage_db::models::generation_job::{CreateGenerationJob, GenerationJob};
use mirage_db::repositories::{CreditRepo, GenerationJobRepo};
use mirage_events::SinkEvent;

use crate::{LifecycleEngine, PipelineError, ProviderQueue};

/// Submit a generation request for `user_id`.
///
/// On success the returned job is `processing` and carries the provider's
/// correlation id. On [`PipelineError::Ledger`] nothing was written; on
/// [`PipelineError::Submission`] the job row exists in `pending` with its
/// charge already refunded.
pub async fn submit_generation(
    engine: &LifecycleEngine,
    queue: &dyn ProviderQueue,
    webhook_url: &str,
    user_id: DbId,
    input: &CreateGenerationJob,
) -> Result<GenerationJob, PipelineError> {
    let pool = engine.pool();
    let cost = model_cost(&input.model_id);

    // One unit of work: job row + charge commit together, or neither.
    let mut tx = pool.begin().await?;
    let job = GenerationJobRepo::create_in_tx(&mut tx, user_id, input).await?;
    CreditRepo::debit_in_tx(
        &mut tx,
        user_id,
        cost,
        TX_GENERATION_CHARGE,
        Some(&format!("Generation with {}", input.model_id)),
        Some(RelatedEntity::generation_job(job.id)),
    )
    .await?;
    tx.commit().await?;

    let params = json!({ "image_url": input.input_ref });

    match queue.submit(&input.model_id, &params, webhook_url).await {
        Ok(request_id) => {
            GenerationJobRepo::set_request_id(pool, job.id, &request_id).await?;
            engine.mark_processing(job.id).await?;

            engine.events().record(
                SinkEvent::new("generation.submitted")
                    .with_user(user_id)
                    .with_payload(json!({
                        "job_id": job.id,
                        "model_id": input.model_id,
                        "cost": cost,
                    })),
            );

            let job = GenerationJobRepo::find_by_id(pool, job.id)
                .await?
                .ok_or(PipelineError::JobNotFound(job.id))?;
            Ok(job)
        }
        Err(e) => {
            tracing::error!(
                job_id = job.id,
                model_id = %input.model_id,
                error = %e,
                "Provider rejected submission; refunding charge"
            );

            CreditRepo::refund_by_entity(
                pool,
                RelatedEntity::generation_job(job.id),
                "submission to provider failed",
            )
            .await?;

            Err(PipelineError::Submission(e))
        }
    }
}
