//! User persistence: insert at registration, list for hydration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Row as stored (email is lowercase).
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub wallet_balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// List all users for hydration at boot.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, password_hash, wallet_balance, is_active, created_at FROM users",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Insert a user. Email must already be lowercase.
pub async fn insert_user(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    email: &str,
    password_hash: &str,
    wallet_balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, wallet_balance, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, TRUE, now())",
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(wallet_balance)
    .execute(pool)
    .await?;
    Ok(())
}
