//! Position persistence: list for hydration. Writes happen only inside the
//! order commit transaction in `ledger::commit_order`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::position::Position;

#[derive(Debug, FromRow)]
pub struct PositionRow {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub units: Decimal,
    pub average_cost: Decimal,
    pub invested_capital: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// List all positions for hydration.
pub async fn list_positions(pool: &PgPool) -> Result<Vec<PositionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PositionRow>(
        "SELECT user_id, product_id, units, average_cost, invested_capital, last_updated \
         FROM positions",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub fn position_row_to_position(row: &PositionRow) -> Position {
    Position {
        user_id: row.user_id,
        product_id: row.product_id,
        units: row.units,
        average_cost: row.average_cost,
        invested_capital: row.invested_capital,
        last_updated: row.last_updated,
    }
}
