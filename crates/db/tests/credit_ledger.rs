//! Integration tests for the credit ledger.
//!
//! Exercises CreditRepo against a real database:
//! - Lazy balance creation
//! - Atomic debit/credit with the append-only log
//! - The balance invariant (balance == sum of transaction amounts)
//! - Insufficient-funds rejection without side effects
//! - Refund-by-entity lookup, including the double-refund guard

use assert_matches::assert_matches;
use sqlx::PgPool;

use mirage_core::billing::{RelatedEntity, TX_GENERATION_CHARGE, TX_GRANT, TX_REFUND};
use mirage_core::types::DbId;
use mirage_db::models::credit::CreditListQuery;
use mirage_db::models::user::CreateUser;
use mirage_db::repositories::{CreditRepo, LedgerError, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_user(pool: &PgPool, email: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            display_name: None,
            role: None,
        },
    )
    .await
    .unwrap()
    .id
}

/// Assert the ledger invariant: stored balance equals the sum of all
/// transaction amounts for the user.
async fn assert_balance_invariant(pool: &PgPool, user_id: DbId) {
    let balance = CreditRepo::balance_of(pool, user_id).await.unwrap();
    let sum: Option<i64> =
        sqlx::query_scalar("SELECT SUM(amount)::BIGINT FROM credit_transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(balance, sum.unwrap_or(0), "balance must equal SUM(amounts)");
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn balance_is_lazily_created_at_zero(pool: PgPool) {
    let user = new_user(&pool, "lazy@example.com").await;
    assert_eq!(CreditRepo::balance_of(&pool, user).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn credit_then_debit_updates_balance_and_log(pool: PgPool) {
    let user = new_user(&pool, "flow@example.com").await;

    CreditRepo::credit(&pool, user, 10, TX_GRANT, Some("starter grant"), None, None)
        .await
        .unwrap();
    assert_eq!(CreditRepo::balance_of(&pool, user).await.unwrap(), 10);

    let related = RelatedEntity::generation_job(1234);
    CreditRepo::debit(&pool, user, 5, TX_GENERATION_CHARGE, None, Some(related))
        .await
        .unwrap();
    assert_eq!(CreditRepo::balance_of(&pool, user).await.unwrap(), 5);

    let txs = CreditRepo::list_for_user(&pool, user, &CreditListQuery { limit: None, offset: None })
        .await
        .unwrap();
    assert_eq!(txs.len(), 2);
    // Newest first.
    assert_eq!(txs[0].amount, -5);
    assert_eq!(txs[0].tx_type, TX_GENERATION_CHARGE);
    assert_eq!(txs[0].related_entity_id, Some(1234));
    assert_eq!(txs[1].amount, 10);

    assert_balance_invariant(&pool, user).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn grant_records_performing_admin(pool: PgPool) {
    let admin = new_user(&pool, "admin@example.com").await;
    let user = new_user(&pool, "grantee@example.com").await;

    CreditRepo::credit(&pool, user, 25, TX_GRANT, None, Some(admin), None)
        .await
        .unwrap();

    let txs = CreditRepo::list_for_user(&pool, user, &CreditListQuery { limit: None, offset: None })
        .await
        .unwrap();
    assert_eq!(txs[0].performed_by, Some(admin));
}

// ---------------------------------------------------------------------------
// Insufficient funds
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn debit_beyond_balance_fails_without_side_effects(pool: PgPool) {
    let user = new_user(&pool, "broke@example.com").await;
    CreditRepo::credit(&pool, user, 50, TX_GRANT, None, None, None)
        .await
        .unwrap();

    let err = CreditRepo::debit(&pool, user, 100, TX_GENERATION_CHARGE, None, None)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        LedgerError::InsufficientFunds {
            required: 100,
            available: 50
        }
    );

    // Balance untouched, no transaction recorded.
    assert_eq!(CreditRepo::balance_of(&pool, user).await.unwrap(), 50);
    let txs = CreditRepo::list_for_user(&pool, user, &CreditListQuery { limit: None, offset: None })
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_balance_invariant(&pool, user).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn non_positive_amounts_are_rejected(pool: PgPool) {
    let user = new_user(&pool, "zero@example.com").await;

    let err = CreditRepo::debit(&pool, user, 0, TX_GENERATION_CHARGE, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, LedgerError::NonPositiveAmount(0));

    let err = CreditRepo::credit(&pool, user, -3, TX_GRANT, None, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, LedgerError::NonPositiveAmount(-3));
}

// ---------------------------------------------------------------------------
// Refunds
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn refund_restores_the_charged_amount(pool: PgPool) {
    let user = new_user(&pool, "refund@example.com").await;
    CreditRepo::credit(&pool, user, 10, TX_GRANT, None, None, None)
        .await
        .unwrap();

    let related = RelatedEntity::generation_job(77);
    CreditRepo::debit(&pool, user, 5, TX_GENERATION_CHARGE, None, Some(related))
        .await
        .unwrap();
    assert_eq!(CreditRepo::balance_of(&pool, user).await.unwrap(), 5);

    let refunded = CreditRepo::refund_by_entity(&pool, related, "provider reported failure")
        .await
        .unwrap();
    assert_eq!(refunded, Some(5));
    assert_eq!(CreditRepo::balance_of(&pool, user).await.unwrap(), 10);

    let txs = CreditRepo::find_by_entity(&pool, related).await.unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].amount, -5);
    assert_eq!(txs[1].amount, 5);
    assert_eq!(txs[1].tx_type, TX_REFUND);
    assert_eq!(txs[1].description.as_deref(), Some("provider reported failure"));

    assert_balance_invariant(&pool, user).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_refund_for_same_entity_is_a_noop(pool: PgPool) {
    let user = new_user(&pool, "double@example.com").await;
    CreditRepo::credit(&pool, user, 10, TX_GRANT, None, None, None)
        .await
        .unwrap();

    let related = RelatedEntity::generation_job(88);
    CreditRepo::debit(&pool, user, 5, TX_GENERATION_CHARGE, None, Some(related))
        .await
        .unwrap();

    assert_eq!(
        CreditRepo::refund_by_entity(&pool, related, "first").await.unwrap(),
        Some(5)
    );
    assert_eq!(
        CreditRepo::refund_by_entity(&pool, related, "second").await.unwrap(),
        None
    );

    // Exactly one refund row, balance restored exactly once.
    let txs = CreditRepo::find_by_entity(&pool, related).await.unwrap();
    assert_eq!(txs.iter().filter(|t| t.tx_type == TX_REFUND).count(), 1);
    assert_eq!(CreditRepo::balance_of(&pool, user).await.unwrap(), 10);
    assert_balance_invariant(&pool, user).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn refund_with_no_charge_returns_none(pool: PgPool) {
    let related = RelatedEntity::generation_job(991);

    let refunded = CreditRepo::refund_by_entity(&pool, related, "nothing to see")
        .await
        .unwrap();
    assert_eq!(refunded, None);

    let txs = CreditRepo::find_by_entity(&pool, related).await.unwrap();
    assert!(txs.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn at_most_one_charge_exists_per_entity(pool: PgPool) {
    let user = new_user(&pool, "single-charge@example.com").await;
    CreditRepo::credit(&pool, user, 100, TX_GRANT, None, None, None)
        .await
        .unwrap();

    let related = RelatedEntity::generation_job(55);
    CreditRepo::debit(&pool, user, 5, TX_GENERATION_CHARGE, None, Some(related))
        .await
        .unwrap();

    let negatives: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM credit_transactions \
         WHERE related_entity_type = $1 AND related_entity_id = $2 AND amount < 0",
    )
    .bind(related.entity_type)
    .bind(related.entity_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(negatives, 1);
}
