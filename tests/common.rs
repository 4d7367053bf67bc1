#![allow(dead_code)]
//! Shared helpers for HTTP-level tests.

use std::collections::HashMap;
use std::sync::Arc;

use rust_broker::api::routes::{AppState, app_router};
use rust_broker::catalog::Catalog;
use rust_broker::ledger::LedgerEngine;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::RwLock;

pub fn test_app_state() -> AppState {
    let catalog = Catalog::default();
    AppState {
        engine: LedgerEngine::new(catalog.clone(), None),
        catalog,
        user_store: Arc::new(RwLock::new(HashMap::new())),
        watchlists: Arc::new(RwLock::new(HashMap::new())),
        jwt_secret: b"test-jwt-secret".to_vec(),
        db: None,
    }
}

/// Spawn app on a random port and return (base_url, guard that keeps the
/// server running).
pub async fn spawn_app(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);
    let app = app_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base_url, handle)
}

/// Register a user and return (token, user_id).
pub async fn register_user(
    client: &reqwest::Client,
    base_url: &str,
    name: &str,
    email: &str,
) -> (String, String) {
    let res = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({ "name": name, "email": email, "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);
    let json: Value = res.json().await.unwrap();
    (
        json["token"].as_str().unwrap().to_string(),
        json["user_id"].as_str().unwrap().to_string(),
    )
}

/// Decimal fields serialize as strings; parse one back for comparisons.
pub fn dec_field(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

/// Look a seeded product up by symbol, returning (id, price_per_unit).
pub async fn product_by_symbol(
    client: &reqwest::Client,
    base_url: &str,
    symbol: &str,
) -> (String, Decimal) {
    let res = client
        .get(format!("{}/products", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: Value = res.json().await.unwrap();
    let product = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["symbol"] == symbol)
        .unwrap_or_else(|| panic!("product {} not seeded", symbol));
    (
        product["id"].as_str().unwrap().to_string(),
        dec_field(&product["price_per_unit"]),
    )
}
