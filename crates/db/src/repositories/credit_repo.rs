//! Repository for the credit ledger (`user_balances` + `credit_transactions`).
//!
//! All balance changes go through [`CreditRepo::debit`] and
//! [`CreditRepo::credit`]; nothing else writes these tables. Every mutating
//! operation updates the balance row and appends the log row inside one
//! database transaction, so the invariant `balance == SUM(amounts)` holds
//! at every commit point.

use sqlx::{PgConnection, PgPool};

use mirage_core::billing::{RelatedEntity, TX_REFUND};
use mirage_core::types::DbId;

use crate::models::credit::{CreditListQuery, CreditTransaction, UserBalance};

/// Column list for `credit_transactions` queries.
const COLUMNS: &str = "\
    id, user_id, amount, tx_type, description, \
    related_entity_type, related_entity_id, performed_by, created_at";

/// Maximum page size for transaction listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for transaction listing.
const DEFAULT_LIMIT: i64 = 50;

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The user's balance cannot cover the requested debit. Recovered
    /// locally; the caller shows the shortfall to the user.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Debit and credit amounts must be strictly positive.
    #[error("Ledger amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Provides atomic debit/credit/refund operations over the credit ledger.
pub struct CreditRepo;

impl CreditRepo {
    /// Current balance for a user, lazily creating a zero-balance row.
    pub async fn balance_of(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query("INSERT INTO user_balances (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(pool)
            .await?;

        sqlx::query_scalar("SELECT balance FROM user_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Full balance row for a user, lazily creating it at zero.
    pub async fn balance_row(pool: &PgPool, user_id: DbId) -> Result<UserBalance, sqlx::Error> {
        sqlx::query("INSERT INTO user_balances (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(pool)
            .await?;

        sqlx::query_as::<_, UserBalance>(
            "SELECT user_id, balance, updated_at FROM user_balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Atomically take `amount` credits from a user.
    ///
    /// The funds check and the decrement are a single guarded UPDATE, so
    /// two concurrent debits can never both pass against a stale balance.
    /// Fails with [`LedgerError::InsufficientFunds`] without writing
    /// anything if the balance cannot cover the amount.
    pub async fn debit(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        tx_type: &str,
        description: Option<&str>,
        related: Option<RelatedEntity>,
    ) -> Result<(), LedgerError> {
        let mut tx = pool.begin().await?;
        Self::debit_in_tx(&mut tx, user_id, amount, tx_type, description, related).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Transaction-scoped variant of [`debit`](Self::debit), for callers
    /// composing the debit with other writes (the submit unit of work).
    pub async fn debit_in_tx(
        conn: &mut PgConnection,
        user_id: DbId,
        amount: i64,
        tx_type: &str,
        description: Option<&str>,
        related: Option<RelatedEntity>,
    ) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount));
        }

        sqlx::query("INSERT INTO user_balances (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let updated = sqlx::query(
            "UPDATE user_balances \
             SET balance = balance - $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            let available: i64 =
                sqlx::query_scalar("SELECT balance FROM user_balances WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(&mut *conn)
                    .await?;
            // The caller drops the transaction, rolling back the lazy insert.
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        Self::append(conn, user_id, -amount, tx_type, description, None, related).await?;
        Ok(())
    }

    /// Atomically add `amount` credits to a user, creating the balance row
    /// if needed.
    pub async fn credit(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        tx_type: &str,
        description: Option<&str>,
        performed_by: Option<DbId>,
        related: Option<RelatedEntity>,
    ) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount));
        }

        let mut tx = pool.begin().await?;
        Self::credit_in_tx(&mut tx, user_id, amount, tx_type, description, performed_by, related)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Transaction-scoped variant of [`credit`](Self::credit).
    async fn credit_in_tx(
        conn: &mut PgConnection,
        user_id: DbId,
        amount: i64,
        tx_type: &str,
        description: Option<&str>,
        performed_by: Option<DbId>,
        related: Option<RelatedEntity>,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO user_balances (user_id, balance) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE \
             SET balance = user_balances.balance + EXCLUDED.balance, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        Self::append(conn, user_id, amount, tx_type, description, performed_by, related).await?;
        Ok(())
    }

    /// Refund the charge recorded for a related entity, if any.
    ///
    /// Looks up the most recent negative transaction for the entity and
    /// credits its absolute value back with type `"refund"`. Returns the
    /// refunded amount, or `None` when there is nothing to refund: either
    /// no charge was ever taken (a job can fail before its charge), or a
    /// refund for this entity already exists. The second case makes the
    /// operation idempotent: callers racing to refund the same failed job
    /// produce exactly one credit.
    pub async fn refund_by_entity(
        pool: &PgPool,
        related: RelatedEntity,
        reason: &str,
    ) -> Result<Option<i64>, LedgerError> {
        let mut tx = pool.begin().await?;

        // Lock the charge row so concurrent refunds of the same entity
        // serialize; the loser then observes the winner's refund row.
        let query = format!(
            "SELECT {COLUMNS} FROM credit_transactions \
             WHERE related_entity_type = $1 AND related_entity_id = $2 AND amount < 0 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1 \
             FOR UPDATE"
        );
        let charge: Option<CreditTransaction> = sqlx::query_as(&query)
            .bind(related.entity_type)
            .bind(related.entity_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(charge) = charge else {
            return Ok(None);
        };

        let already_refunded: Option<DbId> = sqlx::query_scalar(
            "SELECT id FROM credit_transactions \
             WHERE related_entity_type = $1 AND related_entity_id = $2 AND tx_type = $3 \
             LIMIT 1",
        )
        .bind(related.entity_type)
        .bind(related.entity_id)
        .bind(TX_REFUND)
        .fetch_optional(&mut *tx)
        .await?;

        if already_refunded.is_some() {
            tracing::warn!(
                entity_type = related.entity_type,
                entity_id = related.entity_id,
                "Refund requested for an already-refunded entity; skipping"
            );
            return Ok(None);
        }

        let amount = charge.amount.abs();
        Self::credit_in_tx(
            &mut tx,
            charge.user_id,
            amount,
            TX_REFUND,
            Some(reason),
            None,
            Some(related),
        )
        .await?;

        tx.commit().await?;
        Ok(Some(amount))
    }

    /// List a user's transactions, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        params: &CreditListQuery,
    ) -> Result<Vec<CreditTransaction>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let query = format!(
            "SELECT {COLUMNS} FROM credit_transactions \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CreditTransaction>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// All transactions recorded for a related entity, oldest first.
    pub async fn find_by_entity(
        pool: &PgPool,
        related: RelatedEntity,
    ) -> Result<Vec<CreditTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM credit_transactions \
             WHERE related_entity_type = $1 AND related_entity_id = $2 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, CreditTransaction>(&query)
            .bind(related.entity_type)
            .bind(related.entity_id)
            .fetch_all(pool)
            .await
    }

    /// Append one row to the transaction log.
    async fn append(
        conn: &mut PgConnection,
        user_id: DbId,
        amount: i64,
        tx_type: &str,
        description: Option<&str>,
        performed_by: Option<DbId>,
        related: Option<RelatedEntity>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO credit_transactions \
                 (user_id, amount, tx_type, description, \
                  related_entity_type, related_entity_id, performed_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user_id)
        .bind(amount)
        .bind(tx_type)
        .bind(description)
        .bind(related.map(|r| r.entity_type))
        .bind(related.map(|r| r.entity_id))
        .bind(performed_by)
        .execute(conn)
        .await?;
        Ok(())
    }
}
