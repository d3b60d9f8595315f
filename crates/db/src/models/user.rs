//! Minimal user identity model.
//!
//! Account management lives in the identity service; rows here only anchor
//! ownership of jobs and credit transactions.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mirage_core::types::{DbId, Timestamp};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub created_at: Timestamp,
}

/// DTO for inserting a user row (provisioning and test fixtures).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub display_name: Option<String>,
    pub role: Option<String>,
}
