use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Every component is constructed once at startup and injected here;
/// nothing reaches for ambient singletons. Cheaply cloneable (inner data
/// is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: mirage_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job lifecycle engine (the only writer of job transitions).
    pub engine: Arc<mirage_pipeline::LifecycleEngine>,
    /// Provider queue client, used by submission.
    pub queue: Arc<dyn mirage_pipeline::ProviderQueue>,
    /// Reconciliation poller, shared by the background loop and the
    /// on-demand endpoint.
    pub reconciler: Arc<mirage_pipeline::Reconciler>,
    /// Fire-and-forget observability sink.
    pub event_bus: Arc<mirage_events::EventBus>,
}
