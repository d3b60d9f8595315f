//! Handlers for the `/generations` resource.
//!
//! All endpoints require authentication via [`AuthUser`].
//! Admin users can list all generations; regular users see only their own.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use mirage_core::error::CoreError;
use mirage_core::types::DbId;
use mirage_db::models::generation_job::{CreateGenerationJob, GenerationJob, GenerationListQuery};
use mirage_db::repositories::GenerationJobRepo;
use mirage_pipeline::submit_generation;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Body for `POST /api/v1/generations`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitGenerationRequest {
    /// Provider model identifier.
    #[validate(length(min = 1, max = 200))]
    pub model_id: String,
    /// Reference to the input image.
    #[validate(length(min = 1, max = 2000))]
    pub input_ref: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a generation job by ID and verify the caller owns it (or is
/// admin). Returns `NotFound` if the job does not exist, `Forbidden` if
/// the caller is not the owner and is not an admin.
async fn find_and_authorize(
    pool: &sqlx::PgPool,
    job_id: DbId,
    auth: &AuthUser,
    action: &str,
) -> AppResult<GenerationJob> {
    let job = GenerationJobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "GenerationJob",
            id: job_id,
        }))?;

    if job.user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Cannot {action} another user's generation"
        ))));
    }

    Ok(job)
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generations
///
/// Submit a new generation. Charges the model's credit cost and hands the
/// request to the provider queue. Returns 201 with the created job, 402
/// when the balance cannot cover the cost, and 502 when the provider
/// rejects the submission (the charge is refunded in that case).
pub async fn submit(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SubmitGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let create = CreateGenerationJob {
        model_id: input.model_id,
        input_ref: input.input_ref,
    };

    let job = submit_generation(
        &state.engine,
        state.queue.as_ref(),
        &state.config.webhook_url(),
        auth.user_id,
        &create,
    )
    .await?;

    tracing::info!(
        job_id = job.id,
        model_id = %job.model_id,
        user_id = auth.user_id,
        "Generation submitted",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List / Get
// ---------------------------------------------------------------------------

/// GET /api/v1/generations
///
/// List generations. Admin users see all; regular users see only their
/// own. Supports optional `status_id`, `limit`, and `offset` query
/// parameters.
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<GenerationListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = if auth.is_admin() {
        GenerationJobRepo::list_all(&state.pool, &params).await?
    } else {
        GenerationJobRepo::list_by_user(&state.pool, auth.user_id, &params).await?
    };

    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/generations/{id}
///
/// Get a single generation by ID. Users can only view their own; admins
/// can view any.
pub async fn get(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state.pool, job_id, &auth, "view").await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// POST /api/v1/generations/reconcile
///
/// Run a reconciliation pass on demand. Regular users reconcile only
/// their own stale jobs; admins sweep everyone's. Returns the pass
/// report counters.
pub async fn reconcile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let scope = if auth.is_admin() {
        None
    } else {
        Some(auth.user_id)
    };

    let report = state.reconciler.run_once(scope).await?;

    tracing::info!(
        user_id = auth.user_id,
        checked = report.checked,
        "On-demand reconciliation finished",
    );

    Ok(Json(DataResponse { data: report }))
}
