//! Product catalog: quoted prices, active flags, and synthetic 30-day
//! price history. The ledger engine reads prices from here at execution time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::product::{PricePoint, Product, ProductCategory};

pub type SharedProducts = Arc<RwLock<HashMap<Uuid, Product>>>;

#[derive(Clone, Default)]
pub struct Catalog {
    products: SharedProducts,
}

const HISTORY_DAYS: i64 = 30;

/// Deterministic ±5% walk around the base price, oldest point first.
pub fn synthetic_history(base_price: Decimal, days: i64) -> Vec<PricePoint> {
    let now = Utc::now();
    (0..=days)
        .rev()
        .map(|i| {
            let step = (i * 7) % 11 - 5; // -5..=5 percent
            let price = (base_price * Decimal::from(100 + step) / Decimal::from(100)).round_dp(2);
            PricePoint {
                date: now - Duration::days(i),
                price,
            }
        })
        .collect()
}

impl Catalog {
    pub async fn insert(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn get(&self, product_id: Uuid) -> Option<Product> {
        self.products.read().await.get(&product_id).cloned()
    }

    /// Listing excludes price history; fetch a single product for that.
    pub async fn list(&self, category: Option<ProductCategory>) -> Vec<Product> {
        let guard = self.products.read().await;
        let mut products: Vec<Product> = guard
            .values()
            .filter(|p| p.is_active && category.is_none_or(|c| p.category == c))
            .map(|p| Product {
                price_history: Vec::new(),
                ..p.clone()
            })
            .collect();
        products.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        products
    }

    /// Current quote for an active product. Inactive or unknown products have
    /// no quote.
    pub async fn current_price(&self, product_id: Uuid) -> Option<Decimal> {
        self.products
            .read()
            .await
            .get(&product_id)
            .filter(|p| p.is_active)
            .map(|p| p.price_per_unit)
    }

    pub async fn is_available(&self, product_id: Uuid) -> bool {
        self.products
            .read()
            .await
            .get(&product_id)
            .is_some_and(|p| p.is_active)
    }

    pub async fn set_active(&self, product_id: Uuid, active: bool) -> bool {
        match self.products.write().await.get_mut(&product_id) {
            Some(p) => {
                p.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Seed the demo inventory used when no database is configured.
    pub async fn seed_demo(&self) {
        for product in demo_products() {
            self.insert(product).await;
        }
    }
}

fn demo_product(
    symbol: &str,
    name: &str,
    category: ProductCategory,
    price_per_unit: Decimal,
    sector: &str,
) -> Product {
    Product {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        category,
        price_per_unit,
        sector: Some(sector.to_string()),
        price_history: synthetic_history(price_per_unit, HISTORY_DAYS),
        is_active: true,
    }
}

pub fn demo_products() -> Vec<Product> {
    vec![
        demo_product(
            "RELIANCE",
            "Reliance Industries Ltd",
            ProductCategory::Stock,
            Decimal::new(2450_75, 2),
            "Energy",
        ),
        demo_product(
            "TCS",
            "Tata Consultancy Services",
            ProductCategory::Stock,
            Decimal::new(3680_50, 2),
            "Information Technology",
        ),
        demo_product(
            "HDFCBANK",
            "HDFC Bank Ltd",
            ProductCategory::Stock,
            Decimal::new(1542_30, 2),
            "Banking",
        ),
        demo_product(
            "SBIBLUECHIP",
            "SBI Bluechip Fund",
            ProductCategory::MutualFund,
            Decimal::new(68_45, 2),
            "Mutual Fund",
        ),
        demo_product(
            "HDFCTOP100",
            "HDFC Top 100 Fund",
            ProductCategory::MutualFund,
            Decimal::new(756_20, 2),
            "Mutual Fund",
        ),
    ]
}
