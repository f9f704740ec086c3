//! In-memory adapters for tests and local runs.
//!
//! A unit of work holds the store-wide lock for its whole lifetime and works
//! on a staged copy, so commits are all-or-nothing and units are fully
//! serialized. Not optimized for performance.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::domain::{
    Account, AccountNumber, AccountType, InterestCalculationLog, InterestRate, PeriodIdentifier,
    Transaction, TransactionKind,
};
use crate::ports::{
    InterestEntry, LedgerStore, LedgerUnit, RateStore, RepositoryError, RepositoryResult,
};

const FAILPOINT_DISABLED: usize = usize::MAX;

#[derive(Debug, Default, Clone)]
struct LedgerState {
    accounts: HashMap<Uuid, Account>,
    by_number: HashMap<AccountNumber, Uuid>,
    transactions: Vec<Transaction>,
    logs: Vec<InterestCalculationLog>,
}

impl LedgerState {
    fn account_by_number(&self, number: &AccountNumber) -> Option<&Account> {
        self.by_number.get(number).and_then(|id| self.accounts.get(id))
    }
}

#[derive(Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    saves_before_failure: Arc<AtomicUsize>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            saves_before_failure: Arc::new(AtomicUsize::new(FAILPOINT_DISABLED)),
        }
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `saves + 1`-th entry write fail with a storage error, to
    /// simulate a crash in the middle of a unit of work.
    pub fn fail_after_saves(&self, saves: usize) {
        self.saves_before_failure.store(saves, Ordering::SeqCst);
    }

    pub fn clear_failpoint(&self) {
        self.saves_before_failure.store(FAILPOINT_DISABLED, Ordering::SeqCst);
    }

    /// Every entry in the store, in write order.
    pub async fn all_transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }
}

pub struct InMemoryLedgerUnit {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
    saves_before_failure: Arc<AtomicUsize>,
}

impl InMemoryLedgerUnit {
    fn check_failpoint(&self) -> RepositoryResult<()> {
        let remaining = self.saves_before_failure.load(Ordering::SeqCst);
        if remaining == FAILPOINT_DISABLED {
            return Ok(());
        }
        if remaining == 0 {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(
                "injected storage failure".to_string(),
            )));
        }
        self.saves_before_failure.store(remaining - 1, Ordering::SeqCst);
        Ok(())
    }

    fn entry_mut(&mut self, id: Uuid) -> RepositoryResult<&mut Transaction> {
        self.staged
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }
}

#[async_trait]
impl LedgerUnit for InMemoryLedgerUnit {
    async fn lock_account(&mut self, number: &AccountNumber) -> RepositoryResult<Option<Account>> {
        Ok(self.staged.account_by_number(number).cloned())
    }

    async fn lock_account_by_id(&mut self, id: Uuid) -> RepositoryResult<Option<Account>> {
        Ok(self.staged.accounts.get(&id).cloned())
    }

    async fn account_number_exists(&mut self, number: &AccountNumber) -> RepositoryResult<bool> {
        Ok(self.staged.by_number.contains_key(number))
    }

    async fn lock_accounts_of_type(
        &mut self,
        account_type: AccountType,
    ) -> RepositoryResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .staged
            .accounts
            .values()
            .filter(|a| a.account_type == account_type)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.number.as_str().cmp(b.number.as_str()));
        Ok(accounts)
    }

    async fn has_withdrawal_between(
        &mut self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        Ok(self.staged.transactions.iter().any(|t| {
            t.account_id == account_id
                && t.kind == TransactionKind::Withdraw
                && t.created_at >= from
                && t.created_at <= to
        }))
    }

    async fn insert_account(&mut self, account: &Account) -> RepositoryResult<()> {
        if self.staged.by_number.contains_key(&account.number) {
            return Err(RepositoryError::Conflict(format!(
                "account number {} already exists",
                account.number
            )));
        }
        self.staged.by_number.insert(account.number.clone(), account.id);
        self.staged.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn save_entry(&mut self, account: &Account, entry: &Transaction) -> RepositoryResult<()> {
        self.check_failpoint()?;
        let stored = self
            .staged
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("account {}", account.number)))?;
        *stored = account.clone();
        self.staged.transactions.push(entry.clone());
        Ok(())
    }

    async fn lock_interest_entries(
        &mut self,
        account_type: AccountType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<InterestEntry>> {
        let mut entries: Vec<InterestEntry> = self
            .staged
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Interest && t.created_at >= from && t.created_at <= to)
            .filter_map(|t| {
                let account = self.staged.accounts.get(&t.account_id)?;
                (account.account_type == account_type).then(|| InterestEntry {
                    entry: t.clone(),
                    account_number: account.number.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.account_number
                .as_str()
                .cmp(b.account_number.as_str())
                .then(a.entry.seq.cmp(&b.entry.seq))
        });
        Ok(entries)
    }

    async fn lock_interest_entry(&mut self, id: Uuid) -> RepositoryResult<Option<Transaction>> {
        Ok(self
            .staged
            .transactions
            .iter()
            .find(|t| t.id == id && t.kind == TransactionKind::Interest)
            .cloned())
    }

    async fn save_repriced_entry(
        &mut self,
        account: &Account,
        entry: &Transaction,
    ) -> RepositoryResult<()> {
        self.check_failpoint()?;
        *self.entry_mut(entry.id)? = entry.clone();
        let stored = self
            .staged
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("account {}", account.number)))?;
        *stored = account.clone();
        Ok(())
    }

    async fn accrual_log(
        &mut self,
        period: &PeriodIdentifier,
    ) -> RepositoryResult<Option<InterestCalculationLog>> {
        Ok(self
            .staged
            .logs
            .iter()
            .find(|log| &log.period_identifier == period)
            .cloned())
    }

    async fn insert_accrual_log(&mut self, log: &InterestCalculationLog) -> RepositoryResult<()> {
        if self
            .staged
            .logs
            .iter()
            .any(|existing| existing.period_identifier == log.period_identifier)
        {
            return Err(RepositoryError::Conflict(format!(
                "accrual log {} already exists",
                log.period_identifier
            )));
        }
        self.staged.logs.push(log.clone());
        Ok(())
    }

    async fn set_printed(&mut self, ids: &[Uuid], printed: bool) -> RepositoryResult<u64> {
        let mut updated = 0;
        for id in ids {
            self.entry_mut(*id)?.printed = printed;
            updated += 1;
        }
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let InMemoryLedgerUnit {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnit>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryLedgerUnit {
            guard,
            staged,
            saves_before_failure: self.saves_before_failure.clone(),
        }))
    }

    async fn find_account(&self, number: &AccountNumber) -> RepositoryResult<Option<Account>> {
        Ok(self.state.lock().await.account_by_number(number).cloned())
    }

    async fn list_transactions(&self, account_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        let mut entries: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by_key(|t| t.seq);
        Ok(entries)
    }

    async fn find_accrual_log(
        &self,
        period: &PeriodIdentifier,
    ) -> RepositoryResult<Option<InterestCalculationLog>> {
        Ok(self
            .state
            .lock()
            .await
            .logs
            .iter()
            .find(|log| &log.period_identifier == period)
            .cloned())
    }

    async fn list_accrual_logs(&self, limit: i64) -> RepositoryResult<Vec<InterestCalculationLog>> {
        let state = self.state.lock().await;
        let mut logs = state.logs.clone();
        logs.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        logs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logs)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRateStore {
    rates: RwLock<HashMap<AccountType, InterestRate>>,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    async fn get(&self, account_type: AccountType) -> RepositoryResult<Option<InterestRate>> {
        Ok(self.rates.read().await.get(&account_type).cloned())
    }

    async fn upsert(
        &self,
        account_type: AccountType,
        rate: &BigDecimal,
        at: DateTime<Utc>,
    ) -> RepositoryResult<InterestRate> {
        let record = InterestRate {
            account_type,
            rate: rate.clone(),
            updated_at: at,
        };
        self.rates.write().await.insert(account_type, record.clone());
        Ok(record)
    }

    async fn list(&self) -> RepositoryResult<Vec<InterestRate>> {
        let rates = self.rates.read().await;
        Ok(AccountType::ALL
            .iter()
            .filter_map(|t| rates.get(t).cloned())
            .collect())
    }
}
