//! HTTP layer: router, shared state, and handlers. Thin over the ledger
//! engine, catalog, and valuation service; all request validation that
//! matters happens inside the engine.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::api::auth::{self, AuthUser, AuthUserCredential};
use crate::catalog::Catalog;
use crate::ledger::{self, LedgerEngine, OrderError};
use crate::persistence;
use crate::types::ledger::{OrderSide, RecordStatus};
use crate::types::product::{Product, ProductCategory};
use crate::types::user::WatchlistEntry;
use crate::valuation;

pub type UserStore = Arc<RwLock<HashMap<String, AuthUserCredential>>>;
// TODO: persist watchlists so they survive a restart the way positions do.
pub type SharedWatchlists = Arc<RwLock<HashMap<Uuid, Vec<WatchlistEntry>>>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: LedgerEngine,
    pub catalog: Catalog,
    pub user_store: UserStore,
    pub watchlists: SharedWatchlists,
    pub jwt_secret: Vec<u8>,
    pub db: Option<PgPool>,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/orders/buy", post(buy))
        .route("/orders/sell", post(sell))
        .route("/portfolio", get(portfolio_dashboard))
        .route("/portfolio/holdings/{product_id}", get(holding_detail))
        .route("/portfolio/watchlist", post(add_to_watchlist))
        .route(
            "/portfolio/watchlist/{product_id}",
            delete(remove_from_watchlist),
        )
        .route("/transactions", get(list_transactions))
        .route("/transactions/summary/stats", get(transaction_stats))
        .route("/transactions/{id}", get(get_transaction))
        .with_state(state)
}

async fn health() -> &'static str {
    "healthy"
}

fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "error": message }))
}

fn unauthorized(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, error_body(message))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("missing authorization header"))?;
        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("expected a bearer token"))?;
        let claims = auth::decode_token(&state.jwt_secret, token)
            .map_err(|_| unauthorized("invalid or expired token"))?;
        let user_id: Uuid = claims
            .sub
            .parse()
            .map_err(|_| unauthorized("invalid token subject"))?;
        Ok(AuthUser { user_id })
    }
}

// --- Auth ---

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<Value>) {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("name, email and password are required"),
        );
    }
    if !email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            error_body("please enter a valid email"),
        );
    }
    let password_hash = match auth::hash_password(&req.password) {
        Ok(hash) => hash,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("failed to hash password"),
            );
        }
    };

    let user_id = Uuid::new_v4();
    {
        // Hold the write lock across the duplicate check and the insert.
        let mut store = state.user_store.write().await;
        if store.contains_key(&email) {
            return (
                StatusCode::BAD_REQUEST,
                error_body("user with this email already exists"),
            );
        }
        store.insert(
            email.clone(),
            AuthUserCredential {
                user_id,
                name: name.clone(),
                email: email.clone(),
                password_hash: password_hash.clone(),
            },
        );
    }
    let opening_balance = ledger::starting_balance();
    state.engine.open_account(user_id, opening_balance).await;
    if let Some(pool) = &state.db {
        if let Err(e) = persistence::insert_user(
            pool,
            user_id,
            &name,
            &email,
            &password_hash,
            opening_balance,
        )
        .await
        {
            warn!(user = %user_id, error = %e, "failed to mirror user to database");
        }
    }

    match auth::create_token(&state.jwt_secret, user_id) {
        Ok(token) => (
            StatusCode::CREATED,
            Json(json!({
                "token": token,
                "user_id": user_id,
                "name": name,
                "email": email,
                "wallet_balance": opening_balance,
            })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("failed to issue token"),
        ),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<Value>) {
    let email = req.email.trim().to_lowercase();
    let store = state.user_store.read().await;
    let Some(cred) = store.get(&email) else {
        return unauthorized("invalid email or password");
    };
    if !auth::verify_password(&cred.password_hash, &req.password) {
        return unauthorized("invalid email or password");
    }
    let balance = state.engine.wallet_balance(cred.user_id).await;
    match auth::create_token(&state.jwt_secret, cred.user_id) {
        Ok(token) => (
            StatusCode::OK,
            Json(json!({
                "token": token,
                "user_id": cred.user_id,
                "name": cred.name,
                "wallet_balance": balance,
            })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("failed to issue token"),
        ),
    }
}

async fn me(State(state): State<AppState>, user: AuthUser) -> (StatusCode, Json<Value>) {
    let store = state.user_store.read().await;
    let Some(cred) = store.values().find(|c| c.user_id == user.user_id) else {
        return (StatusCode::NOT_FOUND, error_body("user not found"));
    };
    let balance = state.engine.wallet_balance(user.user_id).await;
    (
        StatusCode::OK,
        Json(json!({
            "user_id": cred.user_id,
            "name": cred.name,
            "email": cred.email,
            "wallet_balance": balance,
        })),
    )
}

// --- Products ---

#[derive(Deserialize)]
pub struct ProductListParams {
    pub category: Option<ProductCategory>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> (StatusCode, Json<Value>) {
    let products = state.catalog.list(params.category).await;
    (
        StatusCode::OK,
        Json(json!({ "count": products.len(), "data": products })),
    )
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    match state.catalog.get(id).await {
        Some(product) if product.is_active => (StatusCode::OK, Json(json!({ "data": product }))),
        _ => (
            StatusCode::NOT_FOUND,
            error_body("product not found or not available"),
        ),
    }
}

// --- Orders ---

#[derive(Deserialize)]
pub struct OrderRequest {
    pub product_id: Uuid,
    pub units: Decimal,
}

async fn buy(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<OrderRequest>,
) -> (StatusCode, Json<Value>) {
    place_order(state, user, req, OrderSide::Buy).await
}

async fn sell(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<OrderRequest>,
) -> (StatusCode, Json<Value>) {
    place_order(state, user, req, OrderSide::Sell).await
}

async fn place_order(
    state: AppState,
    user: AuthUser,
    req: OrderRequest,
    side: OrderSide,
) -> (StatusCode, Json<Value>) {
    // The catalog quotes the execution price; clients never supply one.
    let Some(price) = state.catalog.current_price(req.product_id).await else {
        return (
            StatusCode::NOT_FOUND,
            error_body("product not found or not available"),
        );
    };
    match state
        .engine
        .execute_order(user.user_id, req.product_id, side, req.units, price)
        .await
    {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(json!({
                "transaction": outcome.record,
                "new_wallet_balance": outcome.new_wallet_balance,
                "position": outcome.position,
            })),
        ),
        Err(err) => order_error_response(err),
    }
}

fn order_error_response(err: OrderError) -> (StatusCode, Json<Value>) {
    match err {
        OrderError::InvalidInput => (StatusCode::BAD_REQUEST, error_body(&err.to_string())),
        OrderError::InsufficientFunds {
            required,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "insufficient wallet balance",
                "required": required,
                "available": available,
            })),
        ),
        OrderError::InsufficientHoldings {
            available,
            requested,
        } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "insufficient units to sell",
                "available": available,
                "requested": requested,
            })),
        ),
        OrderError::ProductUnavailable | OrderError::UserUnavailable => {
            (StatusCode::NOT_FOUND, error_body(&err.to_string()))
        }
        OrderError::ConcurrentModification => (StatusCode::CONFLICT, error_body(&err.to_string())),
        OrderError::StorageFailure(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(&err.to_string()),
        ),
    }
}

// --- Portfolio ---

fn product_summary(product: &Product) -> Value {
    json!({
        "id": product.id,
        "symbol": product.symbol,
        "name": product.name,
        "category": product.category,
        "price_per_unit": product.price_per_unit,
    })
}

async fn portfolio_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> (StatusCode, Json<Value>) {
    let Some(positions) = state.engine.get_positions(user.user_id).await else {
        return (
            StatusCode::NOT_FOUND,
            error_body("user not found or account inactive"),
        );
    };

    let mut prices = HashMap::new();
    let mut holdings = Vec::new();
    for position in &positions {
        let product = state.catalog.get(position.product_id).await;
        let price = product
            .as_ref()
            .map(|p| p.price_per_unit)
            .unwrap_or(Decimal::ZERO);
        prices.insert(position.product_id, price);
        let valued = valuation::value_position(position, price);
        holdings.push(json!({
            "product": product.as_ref().map(product_summary),
            "units": position.units,
            "average_cost": position.average_cost,
            "invested_capital": position.invested_capital,
            "last_updated": position.last_updated,
            "current_value": valued.current_value,
            "unrealized_return": valued.unrealized_return,
            "return_pct": valued.return_pct,
        }));
    }
    let summary = valuation::summarize(&positions, &prices);
    let watchlist = watchlist_view(&state, user.user_id).await;

    (
        StatusCode::OK,
        Json(json!({
            "summary": summary,
            "holdings": holdings,
            "watchlist": watchlist,
        })),
    )
}

async fn holding_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    let Some(position) = state.engine.get_position(user.user_id, product_id).await else {
        return (StatusCode::NOT_FOUND, error_body("holding not found"));
    };
    let product = state.catalog.get(product_id).await;
    let price = product
        .as_ref()
        .map(|p| p.price_per_unit)
        .unwrap_or(Decimal::ZERO);
    let valued = valuation::value_position(&position, price);
    let transactions: Vec<_> = state
        .engine
        .get_ledger(user.user_id)
        .await
        .unwrap_or_default()
        .into_iter()
        .rev()
        .filter(|r| r.product_id == product_id)
        .take(10)
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "position": position,
            "product": product.as_ref().map(product_summary),
            "current_value": valued.current_value,
            "unrealized_return": valued.unrealized_return,
            "return_pct": valued.return_pct,
            "transactions": transactions,
        })),
    )
}

// --- Watchlist ---

async fn watchlist_view(state: &AppState, user_id: Uuid) -> Vec<Value> {
    let entries = state
        .watchlists
        .read()
        .await
        .get(&user_id)
        .cloned()
        .unwrap_or_default();
    let mut items = Vec::new();
    for entry in entries {
        let product = state.catalog.get(entry.product_id).await;
        items.push(json!({
            "product_id": entry.product_id,
            "added_at": entry.added_at,
            "product": product.as_ref().map(product_summary),
        }));
    }
    items
}

#[derive(Deserialize)]
pub struct WatchlistRequest {
    pub product_id: Uuid,
}

async fn add_to_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<WatchlistRequest>,
) -> (StatusCode, Json<Value>) {
    if !state.catalog.is_available(req.product_id).await {
        return (
            StatusCode::NOT_FOUND,
            error_body("product not found or not available"),
        );
    }
    {
        let mut guard = state.watchlists.write().await;
        let entries = guard.entry(user.user_id).or_default();
        if entries.iter().any(|e| e.product_id == req.product_id) {
            return (
                StatusCode::BAD_REQUEST,
                error_body("product already in watchlist"),
            );
        }
        entries.push(WatchlistEntry {
            product_id: req.product_id,
            added_at: Utc::now(),
        });
    }
    let watchlist = watchlist_view(&state, user.user_id).await;
    (StatusCode::CREATED, Json(json!({ "watchlist": watchlist })))
}

async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    {
        let mut guard = state.watchlists.write().await;
        let entries = guard.entry(user.user_id).or_default();
        let before = entries.len();
        entries.retain(|e| e.product_id != product_id);
        if entries.len() == before {
            return (
                StatusCode::NOT_FOUND,
                error_body("product not found in watchlist"),
            );
        }
    }
    let watchlist = watchlist_view(&state, user.user_id).await;
    (StatusCode::OK, Json(json!({ "watchlist": watchlist })))
}

// --- Transactions ---

#[derive(Deserialize)]
pub struct TransactionListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub side: Option<OrderSide>,
    pub status: Option<RecordStatus>,
}

async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<TransactionListParams>,
) -> (StatusCode, Json<Value>) {
    let Some(ledger) = state.engine.get_ledger(user.user_id).await else {
        return (
            StatusCode::NOT_FOUND,
            error_body("user not found or account inactive"),
        );
    };
    let page = params.page.unwrap_or(1).max(1) as usize;
    let limit = params.limit.unwrap_or(10).clamp(1, 100) as usize;

    // Newest first, like the ledger is read everywhere else.
    let filtered: Vec<_> = ledger
        .into_iter()
        .rev()
        .filter(|r| params.side.is_none_or(|s| r.side == s))
        .filter(|r| params.status.is_none_or(|s| r.status == s))
        .collect();
    let total_records = filtered.len();
    let total_pages = total_records.div_ceil(limit);
    let data: Vec<_> = filtered
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "data": data,
            "pagination": {
                "current_page": page,
                "total_pages": total_pages,
                "total_records": total_records,
                "has_next_page": page < total_pages,
                "has_prev_page": page > 1,
            },
        })),
    )
}

async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    match state.engine.get_record(user.user_id, id).await {
        Some(record) => (StatusCode::OK, Json(json!({ "data": record }))),
        None => (StatusCode::NOT_FOUND, error_body("transaction not found")),
    }
}

async fn transaction_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> (StatusCode, Json<Value>) {
    let Some(ledger) = state.engine.get_ledger(user.user_id).await else {
        return (
            StatusCode::NOT_FOUND,
            error_body("user not found or account inactive"),
        );
    };
    let mut total_buys = 0usize;
    let mut total_sells = 0usize;
    let mut amount_invested = Decimal::ZERO;
    let mut amount_received = Decimal::ZERO;
    let mut realized_return = Decimal::ZERO;
    for record in &ledger {
        match record.side {
            OrderSide::Buy => {
                total_buys += 1;
                amount_invested += record.total_amount;
            }
            OrderSide::Sell => {
                total_sells += 1;
                amount_received += record.total_amount;
                realized_return += record.realized_return;
            }
        }
    }
    (
        StatusCode::OK,
        Json(json!({
            "total_transactions": ledger.len(),
            "total_buy_transactions": total_buys,
            "total_sell_transactions": total_sells,
            "total_amount_invested": amount_invested,
            "total_amount_received": amount_received,
            "total_realized_return": realized_return,
        })),
    )
}
