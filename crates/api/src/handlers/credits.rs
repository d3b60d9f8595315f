//! Handlers for the `/credits` resource.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use mirage_core::billing::TX_GRANT;
use mirage_core::error::CoreError;
use mirage_core::types::DbId;
use mirage_db::models::credit::CreditListQuery;
use mirage_db::repositories::{CreditRepo, UserRepo};
use mirage_events::SinkEvent;
use mirage_pipeline::PipelineError;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Body for `POST /api/v1/credits/grant` (admin only).
#[derive(Debug, Deserialize, Validate)]
pub struct GrantRequest {
    pub user_id: DbId,
    #[validate(range(min = 1))]
    pub amount: i64,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Balance / history
// ---------------------------------------------------------------------------

/// GET /api/v1/credits/balance
///
/// Current credit balance for the calling user. A user who has never been
/// referenced before reads as zero.
pub async fn balance(auth: AuthUser, State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let row = CreditRepo::balance_row(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: row }))
}

/// GET /api/v1/credits/transactions
///
/// The calling user's transaction history, newest first.
pub async fn transactions(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<CreditListQuery>,
) -> AppResult<impl IntoResponse> {
    let txs = CreditRepo::list_for_user(&state.pool, auth.user_id, &params).await?;
    Ok(Json(DataResponse { data: txs }))
}

// ---------------------------------------------------------------------------
// Grants
// ---------------------------------------------------------------------------

/// POST /api/v1/credits/grant
///
/// Manually credit a user (admin only). The acting admin is recorded on
/// the transaction as `performed_by`.
pub async fn grant(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<GrantRequest>,
) -> AppResult<impl IntoResponse> {
    if !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only admins can issue credit grants".into(),
        )));
    }

    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    UserRepo::find_by_id(&state.pool, input.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: input.user_id,
        }))?;

    CreditRepo::credit(
        &state.pool,
        input.user_id,
        input.amount,
        TX_GRANT,
        input.description.as_deref(),
        Some(auth.user_id),
        None,
    )
    .await
    .map_err(PipelineError::Ledger)?;

    state.event_bus.record(
        SinkEvent::new("credits.granted")
            .with_user(input.user_id)
            .with_payload(json!({
                "amount": input.amount,
                "performed_by": auth.user_id,
            })),
    );

    tracing::info!(
        user_id = input.user_id,
        amount = input.amount,
        performed_by = auth.user_id,
        "Credits granted",
    );

    Ok(StatusCode::CREATED)
}
