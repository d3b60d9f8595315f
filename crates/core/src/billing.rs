//! Billing constants: transaction types, related-entity tags, model pricing.

use serde::Serialize;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Transaction types
// ---------------------------------------------------------------------------

/// Debit taken when a generation job is submitted.
pub const TX_GENERATION_CHARGE: &str = "generation_charge";

/// Credit restoring a charge after a job fails.
pub const TX_REFUND: &str = "refund";

/// Manually issued credit (admin action, recorded with `performed_by`).
pub const TX_GRANT: &str = "grant";

// ---------------------------------------------------------------------------
// Related entities
// ---------------------------------------------------------------------------

/// Entity type tag linking a credit transaction to a generation job.
pub const ENTITY_GENERATION_JOB: &str = "generation_job";

/// A `(type, id)` pair tying a credit transaction to the entity that
/// caused it. Refunds look the charge up by this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelatedEntity {
    pub entity_type: &'static str,
    pub entity_id: DbId,
}

impl RelatedEntity {
    /// The related entity for a generation job.
    pub fn generation_job(job_id: DbId) -> Self {
        Self {
            entity_type: ENTITY_GENERATION_JOB,
            entity_id: job_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Credits charged for models without an explicit price entry.
pub const DEFAULT_GENERATION_COST: i64 = 5;

/// Credits charged for one generation on the given provider model.
///
/// Prices are whole credit units, never fractional. The table is small
/// and static; provider model ids are the fal.ai queue identifiers.
pub fn model_cost(model_id: &str) -> i64 {
    match model_id {
        "fal-ai/kling-video/v1.6/standard/image-to-video" => 5,
        "fal-ai/kling-video/v1.6/pro/image-to-video" => 10,
        "fal-ai/minimax/video-01/image-to-video" => 8,
        _ => DEFAULT_GENERATION_COST,
    }
}
