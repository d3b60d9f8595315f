//! Generation job entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mirage_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJob {
    pub id: DbId,
    pub user_id: DbId,
    /// Provider model identifier, e.g. `fal-ai/kling-video/v1.6/standard/image-to-video`.
    pub model_id: String,
    /// Provider-issued correlation id. `None` until submission is confirmed.
    pub request_id: Option<String>,
    pub status_id: StatusId,
    pub input_ref: String,
    pub output_ref: Option<String>,
    /// Provider-assigned seed/variant identifier, if the model reports one.
    pub seed: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// DTO for creating a new pending job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGenerationJob {
    pub model_id: String,
    pub input_ref: String,
}

/// Query parameters for `GET /api/v1/generations`.
#[derive(Debug, Deserialize)]
pub struct GenerationListQuery {
    /// Filter by status ID (e.g. 1 = pending, 4 = failed).
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
