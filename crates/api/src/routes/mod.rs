//! Route definitions.

use axum::Router;

use crate::state::AppState;

pub mod credits;
pub mod generations;
pub mod health;
pub mod webhooks;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generations", generations::router())
        .nest("/credits", credits::router())
        .nest("/webhooks", webhooks::router())
}
