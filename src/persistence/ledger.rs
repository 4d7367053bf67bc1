//! Ledger persistence. `commit_order` is the single atomic commit for an
//! executed order: record insert, wallet update, and position upsert/delete
//! ride one database transaction, so a storage failure leaves no partial
//! state behind.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::ledger::{LedgerRecord, OrderSide, RecordStatus};
use crate::types::position::Position;

fn side_to_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn str_to_side(s: &str) -> Option<OrderSide> {
    match s {
        "buy" => Some(OrderSide::Buy),
        "sell" => Some(OrderSide::Sell),
        _ => None,
    }
}

fn status_to_str(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Completed => "completed",
        RecordStatus::Pending => "pending",
        RecordStatus::Failed => "failed",
        RecordStatus::Cancelled => "cancelled",
    }
}

fn str_to_status(s: &str) -> Option<RecordStatus> {
    match s {
        "completed" => Some(RecordStatus::Completed),
        "pending" => Some(RecordStatus::Pending),
        "failed" => Some(RecordStatus::Failed),
        "cancelled" => Some(RecordStatus::Cancelled),
        _ => None,
    }
}

/// Persist one executed order atomically: append the ledger record, set the
/// new wallet balance, and upsert the position (or delete it when the sell
/// closed it out).
pub async fn commit_order(
    pool: &PgPool,
    record: &LedgerRecord,
    new_wallet_balance: Decimal,
    new_position: Option<&Position>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO ledger_records \
         (id, user_id, product_id, side, units, unit_price, fees, total_amount, realized_return, status, executed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(record.product_id)
    .bind(side_to_str(record.side))
    .bind(record.units)
    .bind(record.unit_price)
    .bind(record.fees)
    .bind(record.total_amount)
    .bind(record.realized_return)
    .bind(status_to_str(record.status))
    .bind(record.executed_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET wallet_balance = $2 WHERE id = $1")
        .bind(record.user_id)
        .bind(new_wallet_balance)
        .execute(&mut *tx)
        .await?;

    match new_position {
        Some(position) => {
            sqlx::query(
                "INSERT INTO positions (user_id, product_id, units, average_cost, invested_capital, last_updated) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (user_id, product_id) \
                 DO UPDATE SET units = $3, average_cost = $4, invested_capital = $5, last_updated = $6",
            )
            .bind(position.user_id)
            .bind(position.product_id)
            .bind(position.units)
            .bind(position.average_cost)
            .bind(position.invested_capital)
            .bind(position.last_updated)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM positions WHERE user_id = $1 AND product_id = $2")
                .bind(record.user_id)
                .bind(record.product_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await
}

#[derive(Debug, FromRow)]
pub struct LedgerRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub side: String,
    pub units: Decimal,
    pub unit_price: Decimal,
    pub fees: Decimal,
    pub total_amount: Decimal,
    pub realized_return: Decimal,
    pub status: String,
    pub executed_at: DateTime<Utc>,
}

/// List a user's ledger in execution order, for hydration.
pub async fn list_ledger_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<LedgerRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LedgerRow>(
        "SELECT id, user_id, product_id, side, units, unit_price, fees, total_amount, realized_return, status, executed_at \
         FROM ledger_records WHERE user_id = $1 ORDER BY executed_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Convert a row to a LedgerRecord. Skips rows with unknown side/status.
pub fn ledger_row_to_record(row: &LedgerRow) -> Option<LedgerRecord> {
    let side = str_to_side(&row.side)?;
    let status = str_to_status(&row.status)?;
    Some(LedgerRecord {
        id: row.id,
        user_id: row.user_id,
        product_id: row.product_id,
        side,
        units: row.units,
        unit_price: row.unit_price,
        fees: row.fees,
        total_amount: row.total_amount,
        realized_return: row.realized_return,
        status,
        executed_at: row.executed_at,
    })
}
