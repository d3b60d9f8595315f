//! Route definitions for the `/generations` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generations;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// GET    /                -> list
/// POST   /                -> submit
/// GET    /{id}            -> get
/// POST   /reconcile       -> reconcile
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(generations::list).post(generations::submit))
        .route("/reconcile", post(generations::reconcile))
        .route("/{id}", get(generations::get))
}
