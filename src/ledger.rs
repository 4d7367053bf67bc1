//! Ledger engine: the single write path for wallet balances, positions, and
//! the transaction ledger. Each account is guarded by its own mutex so orders
//! for one user are serialized while different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::sleep;
use tracing::{error, info};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::persistence;
use crate::types::ledger::{LedgerRecord, OrderSide, RecordStatus};
use crate::types::position::Position;

/// One user's trading state. Everything the engine mutates lives behind the
/// same lock so wallet, positions, and ledger can only change together.
#[derive(Debug)]
pub struct Account {
    pub user_id: Uuid,
    pub wallet_balance: Decimal,
    pub is_active: bool,
    pub positions: HashMap<Uuid, Position>,
    pub ledger: Vec<LedgerRecord>,
}

impl Account {
    pub fn new(user_id: Uuid, opening_balance: Decimal) -> Self {
        Self {
            user_id,
            wallet_balance: opening_balance,
            is_active: true,
            positions: HashMap::new(),
            ledger: Vec::new(),
        }
    }
}

pub type SharedAccount = Arc<Mutex<Account>>;

/// New accounts start with 1,00,000.00 in the wallet.
pub fn starting_balance() -> Decimal {
    Decimal::from(100_000)
}

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("units and unit price must be greater than zero")]
    InvalidInput,
    #[error("insufficient wallet balance")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    #[error("insufficient units to sell")]
    InsufficientHoldings {
        available: Decimal,
        requested: Decimal,
    },
    #[error("product not found or not available")]
    ProductUnavailable,
    #[error("user not found or account inactive")]
    UserUnavailable,
    #[error("account is processing another order, try again")]
    ConcurrentModification,
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

/// Result of a completed order: the appended ledger record plus the
/// post-mutation wallet and position snapshots. `position` is None when a
/// sell closed the position out.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub record: LedgerRecord,
    pub new_wallet_balance: Decimal,
    pub position: Option<Position>,
}

const LOCK_ATTEMPTS: u32 = 5;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(20);

#[derive(Clone)]
pub struct LedgerEngine {
    accounts: Arc<RwLock<HashMap<Uuid, SharedAccount>>>,
    catalog: Catalog,
    db: Option<PgPool>,
}

impl LedgerEngine {
    pub fn new(catalog: Catalog, db: Option<PgPool>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            catalog,
            db,
        }
    }

    /// Create an account if none exists for the user. Returns false when one
    /// already did.
    pub async fn open_account(&self, user_id: Uuid, opening_balance: Decimal) -> bool {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&user_id) {
            return false;
        }
        accounts.insert(
            user_id,
            Arc::new(Mutex::new(Account::new(user_id, opening_balance))),
        );
        true
    }

    /// Install a fully-formed account, replacing any existing one. Used when
    /// hydrating from the database at boot.
    pub async fn restore_account(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.user_id, Arc::new(Mutex::new(account)));
    }

    pub async fn set_account_active(&self, user_id: Uuid, active: bool) -> bool {
        match self.handle(user_id).await {
            Some(account) => {
                account.lock().await.is_active = active;
                true
            }
            None => false,
        }
    }

    pub async fn wallet_balance(&self, user_id: Uuid) -> Option<Decimal> {
        let account = self.handle(user_id).await?;
        let guard = account.lock().await;
        Some(guard.wallet_balance)
    }

    pub async fn get_positions(&self, user_id: Uuid) -> Option<Vec<Position>> {
        let account = self.handle(user_id).await?;
        let guard = account.lock().await;
        let mut positions: Vec<Position> = guard.positions.values().cloned().collect();
        positions.sort_by_key(|p| p.product_id);
        Some(positions)
    }

    pub async fn get_position(&self, user_id: Uuid, product_id: Uuid) -> Option<Position> {
        let account = self.handle(user_id).await?;
        let guard = account.lock().await;
        guard.positions.get(&product_id).cloned()
    }

    /// Full ledger for a user, oldest first.
    pub async fn get_ledger(&self, user_id: Uuid) -> Option<Vec<LedgerRecord>> {
        let account = self.handle(user_id).await?;
        let guard = account.lock().await;
        Some(guard.ledger.clone())
    }

    pub async fn get_record(&self, user_id: Uuid, record_id: Uuid) -> Option<LedgerRecord> {
        let account = self.handle(user_id).await?;
        let guard = account.lock().await;
        guard.ledger.iter().find(|r| r.id == record_id).cloned()
    }

    /// Execute a buy or sell atomically: validate funds/holdings, append the
    /// ledger record, move the wallet balance, and update the weighted-average
    /// position — all under the user's lock, so either every effect lands or
    /// none does.
    pub async fn execute_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        side: OrderSide,
        units: Decimal,
        unit_price: Decimal,
    ) -> Result<OrderOutcome, OrderError> {
        if units <= Decimal::ZERO || unit_price <= Decimal::ZERO {
            return Err(OrderError::InvalidInput);
        }
        // The intake layer already resolved the product; re-check here so a
        // product deactivated in between cannot trade.
        if !self.catalog.is_available(product_id).await {
            return Err(OrderError::ProductUnavailable);
        }

        let account = self
            .handle(user_id)
            .await
            .ok_or(OrderError::UserUnavailable)?;
        let mut guard = lock_bounded(&account).await?;
        if !guard.is_active {
            return Err(OrderError::UserUnavailable);
        }

        let fees = Decimal::ZERO;
        let total_amount = units * unit_price + fees;
        let now = Utc::now();

        // Compute the whole mutation first; nothing is applied until the
        // optional storage commit has succeeded.
        let (new_balance, new_position, realized_return) = match side {
            OrderSide::Buy => {
                if guard.wallet_balance < total_amount {
                    return Err(OrderError::InsufficientFunds {
                        required: total_amount,
                        available: guard.wallet_balance,
                    });
                }
                let position = match guard.positions.get(&product_id) {
                    Some(old) => {
                        let new_units = old.units + units;
                        Position {
                            user_id,
                            product_id,
                            units: new_units,
                            average_cost: (old.units * old.average_cost + units * unit_price)
                                / new_units,
                            invested_capital: old.invested_capital + total_amount,
                            last_updated: now,
                        }
                    }
                    None => Position {
                        user_id,
                        product_id,
                        units,
                        average_cost: unit_price,
                        invested_capital: total_amount,
                        last_updated: now,
                    },
                };
                (
                    guard.wallet_balance - total_amount,
                    Some(position),
                    Decimal::ZERO,
                )
            }
            OrderSide::Sell => {
                let Some(old) = guard.positions.get(&product_id) else {
                    return Err(OrderError::InsufficientHoldings {
                        available: Decimal::ZERO,
                        requested: units,
                    });
                };
                if old.units < units {
                    return Err(OrderError::InsufficientHoldings {
                        available: old.units,
                        requested: units,
                    });
                }
                let realized = units * (unit_price - old.average_cost);
                let remaining = old.units - units;
                let position = if remaining.is_zero() {
                    None
                } else {
                    Some(Position {
                        user_id,
                        product_id,
                        units: remaining,
                        // Selling never changes the cost basis of what remains.
                        average_cost: old.average_cost,
                        invested_capital: old.invested_capital - units * old.average_cost,
                        last_updated: now,
                    })
                };
                (guard.wallet_balance + total_amount, position, realized)
            }
        };

        if let Some(position) = &new_position {
            debug_assert!(position.is_reconciled());
        }

        let record = LedgerRecord {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            side,
            units,
            unit_price,
            fees,
            total_amount,
            realized_return,
            status: RecordStatus::Completed,
            executed_at: now,
        };

        // Storage first, memory second: the database transaction is the one
        // atomic commit, and the in-memory apply below cannot fail. A storage
        // error therefore leaves every store untouched.
        if let Some(pool) = &self.db {
            if let Err(e) =
                persistence::commit_order(pool, &record, new_balance, new_position.as_ref()).await
            {
                error!(user = %user_id, product = %product_id, error = %e, "order commit failed");
                return Err(OrderError::StorageFailure(e.to_string()));
            }
        }

        guard.wallet_balance = new_balance;
        match &new_position {
            Some(position) => {
                guard.positions.insert(product_id, position.clone());
            }
            None => {
                guard.positions.remove(&product_id);
            }
        }
        guard.ledger.push(record.clone());

        info!(
            user = %user_id,
            product = %product_id,
            side = ?side,
            units = %units,
            unit_price = %unit_price,
            total = %total_amount,
            balance = %new_balance,
            "order executed"
        );

        Ok(OrderOutcome {
            record,
            new_wallet_balance: new_balance,
            position: new_position,
        })
    }

    async fn handle(&self, user_id: Uuid) -> Option<SharedAccount> {
        self.accounts.read().await.get(&user_id).cloned()
    }
}

/// Bounded lock acquisition: a handful of attempts, then the caller gets a
/// retryable `ConcurrentModification` instead of queueing indefinitely.
async fn lock_bounded(account: &Mutex<Account>) -> Result<MutexGuard<'_, Account>, OrderError> {
    for attempt in 1..=LOCK_ATTEMPTS {
        match account.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(_) if attempt < LOCK_ATTEMPTS => sleep(LOCK_RETRY_DELAY).await,
            Err(_) => {}
        }
    }
    Err(OrderError::ConcurrentModification)
}

/// Rebuild a position by replaying completed ledger records in execution
/// order, using the same arithmetic as `execute_order`. Returns None when the
/// replay ends with zero units held.
pub fn replay_position(
    user_id: Uuid,
    product_id: Uuid,
    records: &[LedgerRecord],
) -> Option<Position> {
    let mut position: Option<Position> = None;
    for record in records
        .iter()
        .filter(|r| r.product_id == product_id && r.status == RecordStatus::Completed)
    {
        match record.side {
            OrderSide::Buy => {
                position = Some(match position {
                    Some(old) => {
                        let new_units = old.units + record.units;
                        Position {
                            units: new_units,
                            average_cost: (old.units * old.average_cost
                                + record.units * record.unit_price)
                                / new_units,
                            invested_capital: old.invested_capital + record.total_amount,
                            last_updated: record.executed_at,
                            ..old
                        }
                    }
                    None => Position {
                        user_id,
                        product_id,
                        units: record.units,
                        average_cost: record.unit_price,
                        invested_capital: record.total_amount,
                        last_updated: record.executed_at,
                    },
                });
            }
            OrderSide::Sell => {
                let old = position.take()?;
                let remaining = old.units - record.units;
                if !remaining.is_zero() {
                    position = Some(Position {
                        units: remaining,
                        invested_capital: old.invested_capital
                            - record.units * old.average_cost,
                        last_updated: record.executed_at,
                        ..old
                    });
                }
            }
        }
    }
    position
}
