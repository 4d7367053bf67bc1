//! Product persistence: upsert at seed time, list for hydration.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::catalog::synthetic_history;
use crate::types::product::{Product, ProductCategory};

fn category_to_str(category: ProductCategory) -> &'static str {
    match category {
        ProductCategory::Stock => "stock",
        ProductCategory::MutualFund => "mutual_fund",
    }
}

fn str_to_category(s: &str) -> Option<ProductCategory> {
    match s {
        "stock" => Some(ProductCategory::Stock),
        "mutual_fund" => Some(ProductCategory::MutualFund),
        _ => None,
    }
}

#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
    pub category: String,
    pub price_per_unit: Decimal,
    pub sector: Option<String>,
    pub is_active: bool,
}

/// Upsert a product (insert or update on conflict).
pub async fn upsert_product(pool: &PgPool, product: &Product) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO products (id, symbol, name, category, price_per_unit, sector, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (id) DO UPDATE SET price_per_unit = $5, is_active = $7",
    )
    .bind(product.id)
    .bind(&product.symbol)
    .bind(&product.name)
    .bind(category_to_str(product.category))
    .bind(product.price_per_unit)
    .bind(&product.sector)
    .bind(product.is_active)
    .execute(pool)
    .await?;
    Ok(())
}

/// List all products for hydration.
pub async fn list_products(pool: &PgPool) -> Result<Vec<ProductRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, symbol, name, category, price_per_unit, sector, is_active FROM products",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Convert a row to a Product, regenerating the synthetic price history
/// (history is not persisted). Skips rows with an unknown category.
pub fn product_row_to_product(row: &ProductRow) -> Option<Product> {
    let category = str_to_category(&row.category)?;
    Some(Product {
        id: row.id,
        symbol: row.symbol.clone(),
        name: row.name.clone(),
        category,
        price_per_unit: row.price_per_unit,
        sector: row.sector.clone(),
        price_history: synthetic_history(row.price_per_unit, 30),
        is_active: row.is_active,
    })
}
