//! Repository for the append-only `events` table.

use sqlx::PgPool;

use mirage_core::types::DbId;

use crate::models::event::EventRecord;

/// Column list for `events` queries.
const COLUMNS: &str = "id, event_type, user_id, payload, source_ip, created_at";

/// Provides insert and query operations for observability events.
pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        user_id: Option<DbId>,
        payload: &serde_json::Value,
        source_ip: Option<&str>,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO events (event_type, user_id, payload, source_ip) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(user_id)
        .bind(payload)
        .bind(source_ip)
        .fetch_one(pool)
        .await
    }

    /// Most recent events of a given type, newest first.
    pub async fn list_by_type(
        pool: &PgPool,
        event_type: &str,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE event_type = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, EventRecord>(&query)
            .bind(event_type)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
