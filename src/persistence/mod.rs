//! Database layer: pool, migrations, and access for users, products,
//! positions, and ledger records. The in-memory engine is authoritative at
//! runtime; these tables take the atomic order commit and feed boot-time
//! hydration.

mod ledger;
mod pool;
mod positions;
mod products;
mod users;

pub use ledger::{LedgerRow, commit_order, ledger_row_to_record, list_ledger_for_user};
pub use pool::{create_pool_and_migrate, run_migrations};
pub use positions::{PositionRow, list_positions, position_row_to_position};
pub use products::{ProductRow, list_products, product_row_to_product, upsert_product};
pub use sqlx::PgPool;
pub use users::{UserRow, insert_user, list_users};
