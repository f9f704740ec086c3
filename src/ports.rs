//! Storage ports. The engines only talk to these traits; adapters live in
//! `crate::adapters`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Account, AccountNumber, AccountType, InterestCalculationLog, InterestRate, PeriodIdentifier,
    Transaction,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

// serialization_failure, deadlock_detected, unique_violation
const CONFLICT_SQLSTATES: &[&str] = &["40001", "40P01", "23505"];

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                let code: &str = &code;
                if CONFLICT_SQLSTATES.contains(&code) {
                    return RepositoryError::Conflict(db_err.message().to_string());
                }
            }
        }
        RepositoryError::Database(err)
    }
}

/// An INTEREST entry together with the number of the account it belongs to.
#[derive(Debug, Clone)]
pub struct InterestEntry {
    pub entry: Transaction,
    pub account_number: AccountNumber,
}

/// One all-or-nothing unit of work. Rows read through `lock_*` stay locked
/// until the unit is committed or dropped; dropping without `commit`
/// discards every write.
#[async_trait]
pub trait LedgerUnit: Send {
    async fn lock_account(&mut self, number: &AccountNumber) -> RepositoryResult<Option<Account>>;

    async fn lock_account_by_id(&mut self, id: Uuid) -> RepositoryResult<Option<Account>>;

    async fn account_number_exists(&mut self, number: &AccountNumber) -> RepositoryResult<bool>;

    /// All accounts of a type, locked, ordered by account number.
    async fn lock_accounts_of_type(
        &mut self,
        account_type: AccountType,
    ) -> RepositoryResult<Vec<Account>>;

    async fn has_withdrawal_between(
        &mut self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    async fn insert_account(&mut self, account: &Account) -> RepositoryResult<()>;

    /// Persists the account's new balance together with the entry that
    /// produced it.
    async fn save_entry(&mut self, account: &Account, entry: &Transaction) -> RepositoryResult<()>;

    /// INTEREST entries of `account_type` accounts created within
    /// `[from, to]`, locked, ordered by account number.
    async fn lock_interest_entries(
        &mut self,
        account_type: AccountType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<InterestEntry>>;

    /// A single INTEREST entry, locked.
    async fn lock_interest_entry(&mut self, id: Uuid) -> RepositoryResult<Option<Transaction>>;

    /// Persists a repriced entry together with the account balance it moved.
    async fn save_repriced_entry(
        &mut self,
        account: &Account,
        entry: &Transaction,
    ) -> RepositoryResult<()>;

    async fn accrual_log(
        &mut self,
        period: &PeriodIdentifier,
    ) -> RepositoryResult<Option<InterestCalculationLog>>;

    async fn insert_accrual_log(&mut self, log: &InterestCalculationLog) -> RepositoryResult<()>;

    /// Sets `printed` on every listed entry; fails with `NotFound` (and
    /// writes nothing) if any id is unknown.
    async fn set_printed(&mut self, ids: &[Uuid], printed: bool) -> RepositoryResult<u64>;

    async fn commit(self: Box<Self>) -> RepositoryResult<()>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnit>>;

    async fn find_account(&self, number: &AccountNumber) -> RepositoryResult<Option<Account>>;

    /// Entries of one account in history order.
    async fn list_transactions(&self, account_id: Uuid) -> RepositoryResult<Vec<Transaction>>;

    async fn find_accrual_log(
        &self,
        period: &PeriodIdentifier,
    ) -> RepositoryResult<Option<InterestCalculationLog>>;

    /// Most recent logs first.
    async fn list_accrual_logs(&self, limit: i64) -> RepositoryResult<Vec<InterestCalculationLog>>;

    async fn ping(&self) -> RepositoryResult<()>;
}

/// Current-value store for interest rates; there is no history.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn get(&self, account_type: AccountType) -> RepositoryResult<Option<InterestRate>>;

    async fn upsert(
        &self,
        account_type: AccountType,
        rate: &BigDecimal,
        at: DateTime<Utc>,
    ) -> RepositoryResult<InterestRate>;

    async fn list(&self) -> RepositoryResult<Vec<InterestRate>>;
}
