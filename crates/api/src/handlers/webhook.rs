//! Handler for provider completion webhooks.
//!
//! The fast path of the convergence loop: the provider posts here when a
//! request finishes, and we drive the job to its terminal state. The
//! handler authenticates the payload, validates its shape at the
//! boundary, and hands a clean outcome to the lifecycle engine.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use mirage_core::error::CoreError;
use mirage_db::repositories::GenerationJobRepo;
use mirage_events::SinkEvent;
use mirage_fal::{WebhookOutcome, WebhookPayload};
use mirage_pipeline::Resolution;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 signature of the raw body.
const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// POST /api/v1/webhooks/fal
///
/// Resolution outcomes:
/// - Known correlation id + `OK` payload: resolve success (200).
/// - Known correlation id + `ERROR`: resolve failure with the raw
///   provider message (200).
/// - Unknown correlation id: log, drop, and still return 200 so the
///   provider stops retrying a callback we will never match.
/// - Bad signature (401) or unparseable/unknown shape (400): rejected at
///   the boundary, nothing reaches the engine.
/// - Artifact persistence failure: 500, so the provider retries and a
///   later delivery (or the reconciler) can finish the job.
pub async fn fal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    verify_signature(&state, &headers, &body)?;

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Unparseable webhook body: {e}")))?;

    let outcome = payload
        .classify()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let Some(job) = GenerationJobRepo::find_by_request_id(&state.pool, &payload.request_id).await?
    else {
        // Not an error: the provider may deliver callbacks for requests
        // we never recorded (e.g. submitted by another environment).
        // Acknowledge so it stops retrying, mutate nothing.
        tracing::warn!(
            request_id = %payload.request_id,
            "Webhook for unknown correlation id; dropping"
        );
        state.event_bus.record(
            SinkEvent::new("webhook.unmatched")
                .with_payload(json!({ "request_id": payload.request_id })),
        );
        return Ok(Json(DataResponse {
            data: json!({ "matched": false }),
        }));
    };

    let resolution = match outcome {
        WebhookOutcome::Success(result) => state.engine.resolve_success(job.id, &result).await?,
        WebhookOutcome::Failure(message) => state.engine.resolve_failure(job.id, &message).await?,
    };

    tracing::info!(
        job_id = job.id,
        request_id = %payload.request_id,
        already_terminal = matches!(resolution, Resolution::AlreadyTerminal),
        "Webhook processed",
    );

    Ok(Json(DataResponse {
        data: json!({
            "matched": true,
            "job_id": job.id,
            "already_terminal": matches!(resolution, Resolution::AlreadyTerminal),
        }),
    }))
}

/// Verify the HMAC-SHA256 signature of the raw body.
///
/// Skipped when no webhook secret is configured (local development).
fn verify_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> AppResult<()> {
    let Some(secret) = &state.config.webhook_secret else {
        return Ok(());
    };

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Missing webhook signature".into()))
        })?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InternalError("Invalid webhook secret length".into()))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if provided != expected {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid webhook signature".into(),
        )));
    }

    Ok(())
}
