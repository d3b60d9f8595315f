//! Repository for the `generation_jobs` table.
//!
//! Storage only: status transitions are guarded in SQL (terminal rows are
//! never updated), but deciding *when* to transition is the pipeline
//! engine's job. Uses `GenerationStatus` from `models::status` for all
//! status literals.

use sqlx::{PgConnection, PgPool};

use mirage_core::types::DbId;

use crate::models::generation_job::{CreateGenerationJob, GenerationJob, GenerationListQuery};
use crate::models::status::{GenerationStatus, StatusId};

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, user_id, model_id, request_id, status_id, \
    input_ref, output_ref, seed, error_message, \
    created_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations for generation jobs.
pub struct GenerationJobRepo;

impl GenerationJobRepo {
    /// Create a new pending job.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateGenerationJob,
    ) -> Result<GenerationJob, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let job = Self::create_in_tx(&mut tx, user_id, input).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Transaction-scoped variant of [`create`](Self::create), for the
    /// submit unit of work (job insert + ledger debit commit together).
    pub async fn create_in_tx(
        conn: &mut PgConnection,
        user_id: DbId,
        input: &CreateGenerationJob,
    ) -> Result<GenerationJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_jobs (user_id, model_id, status_id, input_ref) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(user_id)
            .bind(&input.model_id)
            .bind(GenerationStatus::Pending.id())
            .bind(&input.input_ref)
            .fetch_one(conn)
            .await
    }

    /// Find a job by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its provider correlation ID.
    pub async fn find_by_request_id(
        pool: &PgPool,
        request_id: &str,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE request_id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(request_id)
            .fetch_optional(pool)
            .await
    }

    /// Current status of a job, or `None` if it does not exist.
    ///
    /// Cheap re-read used by the engine and the reconciler before acting.
    pub async fn status_of(pool: &PgPool, id: DbId) -> Result<Option<StatusId>, sqlx::Error> {
        sqlx::query_scalar("SELECT status_id FROM generation_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record the provider correlation ID after a confirmed submission.
    pub async fn set_request_id(
        pool: &PgPool,
        id: DbId,
        request_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE generation_jobs SET request_id = $2 WHERE id = $1")
            .bind(id)
            .bind(request_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Transition `pending -> processing`.
    ///
    /// Returns `false` if the job was not in `pending` (already picked up
    /// or already terminal); the update is then a no-op.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs SET status_id = $2 WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(GenerationStatus::Processing.id())
        .bind(GenerationStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition a non-terminal job to `completed`, storing the output
    /// reference and completion timestamp.
    ///
    /// Returns `false` if the job was already terminal. The guard makes the
    /// transition race-safe: of a webhook and a poller resolving the same
    /// job, exactly one update applies.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        output_ref: &str,
        seed: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, output_ref = $3, seed = COALESCE($4, seed), \
                 completed_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($5, $6)",
        )
        .bind(id)
        .bind(GenerationStatus::Completed.id())
        .bind(output_ref)
        .bind(seed)
        .bind(GenerationStatus::Completed.id())
        .bind(GenerationStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition a non-terminal job to `failed`, storing the error message
    /// and completion timestamp.
    ///
    /// Returns `false` if the job was already terminal.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $5)",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.id())
        .bind(error)
        .bind(GenerationStatus::Completed.id())
        .bind(GenerationStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find non-terminal jobs created before `now() - older_than`,
    /// optionally scoped to one user. Oldest first.
    pub async fn find_stale(
        pool: &PgPool,
        older_than: chrono::Duration,
        only_user: Option<DbId>,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let base = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE status_id IN ($1, $2) \
               AND created_at < NOW() - make_interval(secs => $3)"
        );

        let secs = older_than.num_seconds() as f64;

        if let Some(user_id) = only_user {
            let query = format!("{base} AND user_id = $4 ORDER BY created_at ASC");
            sqlx::query_as::<_, GenerationJob>(&query)
                .bind(GenerationStatus::Pending.id())
                .bind(GenerationStatus::Processing.id())
                .bind(secs)
                .bind(user_id)
                .fetch_all(pool)
                .await
        } else {
            let query = format!("{base} ORDER BY created_at ASC");
            sqlx::query_as::<_, GenerationJob>(&query)
                .bind(GenerationStatus::Pending.id())
                .bind(GenerationStatus::Processing.id())
                .bind(secs)
                .fetch_all(pool)
                .await
        }
    }

    /// List jobs for a specific user with optional status filter and pagination.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        params: &GenerationListQuery,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        Self::list_jobs(pool, Some(user_id), params).await
    }

    /// List all jobs (admin view) with optional status filter and pagination.
    pub async fn list_all(
        pool: &PgPool,
        params: &GenerationListQuery,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        Self::list_jobs(pool, None, params).await
    }

    /// Shared listing query builder. When `user_id` is `Some`, filters to
    /// that user's jobs; when `None`, returns all jobs (admin view).
    async fn list_jobs(
        pool: &PgPool,
        user_id: Option<DbId>,
        params: &GenerationListQuery,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if user_id.is_some() {
            conditions.push(format!("user_id = ${bind_idx}"));
            bind_idx += 1;
        }

        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, GenerationJob>(&query);

        if let Some(uid) = user_id {
            q = q.bind(uid);
        }
        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }

        q = q.bind(limit).bind(offset);

        q.fetch_all(pool).await
    }
}
