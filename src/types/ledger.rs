use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    Pending,
    Failed,
    Cancelled,
}

/// One executed order. Append-only: once written with status Completed the
/// record is never edited; corrections are new offsetting records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub side: OrderSide,
    pub units: Decimal,
    pub unit_price: Decimal,
    pub fees: Decimal,
    /// `units * unit_price + fees`.
    pub total_amount: Decimal,
    /// For sells, `units * (unit_price - average_cost)` at execution time.
    /// Zero for buys.
    pub realized_return: Decimal,
    pub status: RecordStatus,
    pub executed_at: DateTime<Utc>,
}
