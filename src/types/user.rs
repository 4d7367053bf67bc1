use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Watchlist bookkeeping, per user. Display-only; never touched by the
/// ledger engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub product_id: Uuid,
    pub added_at: DateTime<Utc>,
}
