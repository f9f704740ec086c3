pub mod in_memory;
pub mod postgres_ledger_store;
pub mod postgres_rate_store;

pub use in_memory::{InMemoryLedgerStore, InMemoryRateStore};
pub use postgres_ledger_store::PostgresLedgerStore;
pub use postgres_rate_store::PostgresRateStore;
