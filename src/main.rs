use std::collections::HashMap;
use std::sync::Arc;

use rust_broker::api::auth::AuthUserCredential;
use rust_broker::api::routes::{AppState, SharedWatchlists, UserStore, app_router};
use rust_broker::catalog::{self, Catalog};
use rust_broker::ledger::{Account, LedgerEngine};
use rust_broker::persistence;
use rust_broker::types::position::Position;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db = match std::env::var("DATABASE_URL") {
        Ok(url) => Some(
            persistence::create_pool_and_migrate(&url)
                .await
                .expect("failed to connect to database"),
        ),
        Err(_) => None,
    };

    let catalog = Catalog::default();
    let engine = LedgerEngine::new(catalog.clone(), db.clone());
    let user_store: UserStore = Arc::new(RwLock::new(HashMap::new()));
    let watchlists: SharedWatchlists = Arc::new(RwLock::new(HashMap::new()));

    match &db {
        Some(pool) => hydrate(pool, &catalog, &engine, &user_store)
            .await
            .expect("failed to hydrate state from database"),
        None => catalog.seed_demo().await,
    }

    let jwt_secret = std::env::var("JWT_SECRET")
        .map(String::into_bytes)
        .unwrap_or_else(|_| b"dev-secret-change-me".to_vec());

    let state = AppState {
        engine,
        catalog,
        user_store,
        watchlists,
        jwt_secret,
        db,
    };

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await.unwrap();
}

/// Rebuild in-memory state from the database: the catalog (seeded on first
/// boot), stored credentials, and one account per user with its positions
/// and ledger.
async fn hydrate(
    pool: &PgPool,
    catalog: &Catalog,
    engine: &LedgerEngine,
    user_store: &UserStore,
) -> Result<(), sqlx::Error> {
    let product_rows = persistence::list_products(pool).await?;
    let product_count = product_rows.len();
    if product_rows.is_empty() {
        for product in catalog::demo_products() {
            persistence::upsert_product(pool, &product).await?;
            catalog.insert(product).await;
        }
    } else {
        for row in &product_rows {
            if let Some(product) = persistence::product_row_to_product(row) {
                catalog.insert(product).await;
            }
        }
    }

    let position_rows = persistence::list_positions(pool).await?;
    let mut positions_by_user: HashMap<Uuid, HashMap<Uuid, Position>> = HashMap::new();
    for row in &position_rows {
        let position = persistence::position_row_to_position(row);
        positions_by_user
            .entry(row.user_id)
            .or_default()
            .insert(row.product_id, position);
    }

    let user_rows = persistence::list_users(pool).await?;
    let user_count = user_rows.len();
    let mut store = user_store.write().await;
    for row in user_rows {
        let ledger = persistence::list_ledger_for_user(pool, row.id)
            .await?
            .iter()
            .filter_map(persistence::ledger_row_to_record)
            .collect();
        let positions = positions_by_user.remove(&row.id).unwrap_or_default();
        engine
            .restore_account(Account {
                user_id: row.id,
                wallet_balance: row.wallet_balance,
                is_active: row.is_active,
                positions,
                ledger,
            })
            .await;
        store.insert(
            row.email.clone(),
            AuthUserCredential {
                user_id: row.id,
                name: row.name,
                email: row.email,
                password_hash: row.password_hash,
            },
        );
    }
    info!(
        users = user_count,
        products = product_count,
        "hydrated state from database"
    );
    Ok(())
}
