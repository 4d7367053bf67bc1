use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Stock,
    MutualFund,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub price: Decimal,
}

/// Tradable instrument quoted by the catalog. `price_per_unit` is the price
/// every order executes at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
    pub category: ProductCategory,
    pub price_per_unit: Decimal,
    pub sector: Option<String>,
    pub price_history: Vec<PricePoint>,
    pub is_active: bool,
}
