use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Holding per (user, product). Units are always positive: a position whose
/// units reach zero is removed from the portfolio rather than kept as an
/// empty row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub units: Decimal,
    /// Weighted average of all buy fills. Unaffected by sells.
    pub average_cost: Decimal,
    /// Cost basis still held, maintained incrementally: buys add the full
    /// purchase amount, sells remove `units * average_cost`.
    pub invested_capital: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    /// Incremental `invested_capital` must stay in step with
    /// `units * average_cost`. Division in the weighted average can leave
    /// sub-paisa residue, hence the tolerance.
    pub fn is_reconciled(&self) -> bool {
        (self.invested_capital - self.units * self.average_cost).abs() < Decimal::new(1, 2)
    }
}
