//! Valuation: pure read-path math deriving live figures from stored cost
//! data and current catalog prices. No side effects; dashboards call this on
//! every read.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::types::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValuation {
    pub current_value: Decimal,
    pub unrealized_return: Decimal,
    pub return_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_invested: Decimal,
    pub total_current_value: Decimal,
    pub total_return: Decimal,
    pub total_return_pct: Decimal,
}

/// Percentage with the zero-denominator case pinned to 0 rather than left to
/// a division error.
fn return_pct(gain: Decimal, invested: Decimal) -> Decimal {
    if invested > Decimal::ZERO {
        gain / invested * Decimal::from(100)
    } else {
        Decimal::ZERO
    }
}

pub fn value_position(position: &Position, current_price: Decimal) -> PositionValuation {
    let current_value = position.units * current_price;
    let unrealized_return = current_value - position.invested_capital;
    PositionValuation {
        current_value,
        unrealized_return,
        return_pct: return_pct(unrealized_return, position.invested_capital),
    }
}

/// Aggregate across a portfolio. Positions whose product has no quote (e.g.
/// deactivated since purchase) are carried at a current value of zero.
pub fn summarize(positions: &[Position], prices: &HashMap<Uuid, Decimal>) -> PortfolioSummary {
    let mut total_invested = Decimal::ZERO;
    let mut total_current_value = Decimal::ZERO;
    for position in positions {
        let price = prices
            .get(&position.product_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        total_invested += position.invested_capital;
        total_current_value += position.units * price;
    }
    let total_return = total_current_value - total_invested;
    PortfolioSummary {
        total_invested,
        total_current_value,
        total_return,
        total_return_pct: return_pct(total_return, total_invested),
    }
}
