//! Observability event models.

use serde::Serialize;
use sqlx::FromRow;

use mirage_core::types::{DbId, Timestamp};

/// A row from the append-only `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRecord {
    pub id: DbId,
    pub event_type: String,
    pub user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub source_ip: Option<String>,
    pub created_at: Timestamp,
}
