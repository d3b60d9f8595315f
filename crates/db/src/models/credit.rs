//! Credit ledger entity models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mirage_core::types::{DbId, Timestamp};

/// A row from the `user_balances` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserBalance {
    pub user_id: DbId,
    pub balance: i64,
    pub updated_at: Timestamp,
}

/// An immutable row from the `credit_transactions` log.
///
/// Negative `amount` = debit, positive = credit. The optional
/// `(related_entity_type, related_entity_id)` pair links the transaction
/// to the entity that caused it; refunds look the charge up by this pair.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditTransaction {
    pub id: DbId,
    pub user_id: DbId,
    pub amount: i64,
    pub tx_type: String,
    pub description: Option<String>,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<DbId>,
    /// Acting admin for manually issued grants.
    pub performed_by: Option<DbId>,
    pub created_at: Timestamp,
}

/// Query parameters for `GET /api/v1/credits/transactions`.
#[derive(Debug, Deserialize)]
pub struct CreditListQuery {
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
