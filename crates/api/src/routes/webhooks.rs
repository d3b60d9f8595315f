//! Route definitions for provider webhooks.
//!
//! Authenticated by payload signature, not by user token.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /fal             -> fal_webhook
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/fal", post(webhook::fal_webhook))
}
