//! Route definitions for the `/credits` resource.
//!
//! All endpoints require authentication; grants additionally require the
//! admin role.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::credits;
use crate::state::AppState;

/// Routes mounted at `/credits`.
///
/// ```text
/// GET    /balance         -> balance
/// GET    /transactions    -> transactions
/// POST   /grant           -> grant (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(credits::balance))
        .route("/transactions", get(credits::transactions))
        .route("/grant", post(credits::grant))
}
