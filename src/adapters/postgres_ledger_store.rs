//! Postgres implementation of LedgerStore.
//!
//! Each unit of work is one database transaction. Rows are locked with
//! `SELECT ... FOR UPDATE`, so two units touching the same account serialize
//! while units on different accounts run in parallel.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::{
    Account, AccountNumber, AccountType, AccrualStatus, HolderInfo, InterestCalculationLog,
    PeriodIdentifier, Transaction, TransactionKind,
};
use crate::ports::{
    InterestEntry, LedgerStore, LedgerUnit, RepositoryError, RepositoryResult,
};

const ACCOUNT_COLUMNS: &str = "id, number, account_type, name_prefix, first_name, last_name, \
     account_name, national_id, balance, last_seq, created_at";

const TRANSACTION_COLUMNS: &str =
    "id, account_id, seq, kind, amount, balance_after, staff_id, printed, created_at";

const LOG_COLUMNS: &str = "id, period_identifier, account_type, staff_id, status, rate, \
     accounts_affected, total_interest_paid, posted_at, executed_at";

/// Postgres-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PostgresLedgerUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnit for PostgresLedgerUnit {
    async fn lock_account(&mut self, number: &AccountNumber) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE number = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(number.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(AccountRow::into_domain).transpose()
    }

    async fn lock_account_by_id(&mut self, id: Uuid) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(AccountRow::into_domain).transpose()
    }

    async fn account_number_exists(&mut self, number: &AccountNumber) -> RepositoryResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE number = $1)")
                .bind(number.as_str())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn lock_accounts_of_type(
        &mut self,
        account_type: AccountType,
    ) -> RepositoryResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE account_type = $1 ORDER BY number FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(account_type.as_str())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(AccountRow::into_domain).collect()
    }

    async fn has_withdrawal_between(
        &mut self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM ledger_transactions
                WHERE account_id = $1
                AND kind = 'WITHDRAW'
                AND created_at >= $2
                AND created_at <= $3
            )
            "#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_account(&mut self, account: &Account) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, number, account_type, name_prefix, first_name, last_name,
                account_name, national_id, balance, last_seq, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(account.id)
        .bind(account.number.as_str())
        .bind(account.account_type.as_str())
        .bind(&account.holder.name_prefix)
        .bind(&account.holder.first_name)
        .bind(&account.holder.last_name)
        .bind(&account.holder.account_name)
        .bind(&account.holder.national_id)
        .bind(account.balance())
        .bind(account.last_seq())
        .bind(account.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn save_entry(&mut self, account: &Account, entry: &Transaction) -> RepositoryResult<()> {
        update_account_balance(&mut self.tx, account).await?;

        sqlx::query(
            r#"
            INSERT INTO ledger_transactions (
                id, account_id, seq, kind, amount, balance_after, staff_id, printed, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.account_id)
        .bind(entry.seq)
        .bind(entry.kind.as_str())
        .bind(entry.amount())
        .bind(entry.balance_after())
        .bind(&entry.staff_id)
        .bind(entry.printed)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_interest_entries(
        &mut self,
        account_type: AccountType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<InterestEntry>> {
        let rows = sqlx::query_as::<_, InterestEntryRow>(
            r#"
            SELECT t.id, t.account_id, t.seq, t.kind, t.amount, t.balance_after,
                   t.staff_id, t.printed, t.created_at, a.number AS account_number
            FROM ledger_transactions t
            JOIN accounts a ON a.id = t.account_id
            WHERE t.kind = 'INTEREST'
            AND a.account_type = $1
            AND t.created_at >= $2
            AND t.created_at <= $3
            ORDER BY a.number, t.seq
            FOR UPDATE OF t
            "#,
        )
        .bind(account_type.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(InterestEntryRow::into_domain).collect()
    }

    async fn lock_interest_entry(&mut self, id: Uuid) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM ledger_transactions WHERE id = $1 AND kind = 'INTEREST' FOR UPDATE",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn save_repriced_entry(
        &mut self,
        account: &Account,
        entry: &Transaction,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE ledger_transactions SET amount = $1, balance_after = $2 WHERE id = $3 AND kind = 'INTEREST'",
        )
        .bind(entry.amount())
        .bind(entry.balance_after())
        .bind(entry.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(RepositoryError::NotFound(format!("interest entry {}", entry.id)));
        }

        update_account_balance(&mut self.tx, account).await
    }

    async fn accrual_log(
        &mut self,
        period: &PeriodIdentifier,
    ) -> RepositoryResult<Option<InterestCalculationLog>> {
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {} FROM interest_calculation_logs WHERE period_identifier = $1",
            LOG_COLUMNS
        ))
        .bind(period.to_string())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(LogRow::into_domain).transpose()
    }

    async fn insert_accrual_log(&mut self, log: &InterestCalculationLog) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO interest_calculation_logs (
                id, period_identifier, account_type, staff_id, status, rate,
                accounts_affected, total_interest_paid, posted_at, executed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id)
        .bind(log.period_identifier.to_string())
        .bind(log.account_type.as_str())
        .bind(&log.staff_id)
        .bind(log.status.as_str())
        .bind(&log.rate)
        .bind(log.accounts_affected)
        .bind(&log.total_interest_paid)
        .bind(log.posted_at)
        .bind(log.executed_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_printed(&mut self, ids: &[Uuid], printed: bool) -> RepositoryResult<u64> {
        let result = sqlx::query("UPDATE ledger_transactions SET printed = $1 WHERE id = ANY($2)")
            .bind(printed)
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() != ids.len() as u64 {
            return Err(RepositoryError::NotFound(format!(
                "{} of {} transactions",
                ids.len() as u64 - result.rows_affected(),
                ids.len()
            )));
        }
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

async fn update_account_balance(
    tx: &mut sqlx::Transaction<'static, Postgres>,
    account: &Account,
) -> RepositoryResult<()> {
    let result = sqlx::query("UPDATE accounts SET balance = $1, last_seq = $2 WHERE id = $3")
        .bind(account.balance())
        .bind(account.last_seq())
        .bind(account.id)
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() != 1 {
        return Err(RepositoryError::NotFound(format!("account {}", account.number)));
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnit>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresLedgerUnit { tx }))
    }

    async fn find_account(&self, number: &AccountNumber) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE number = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(number.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccountRow::into_domain).transpose()
    }

    async fn list_transactions(&self, account_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM ledger_transactions WHERE account_id = $1 ORDER BY seq ASC",
            TRANSACTION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn find_accrual_log(
        &self,
        period: &PeriodIdentifier,
    ) -> RepositoryResult<Option<InterestCalculationLog>> {
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {} FROM interest_calculation_logs WHERE period_identifier = $1",
            LOG_COLUMNS
        ))
        .bind(period.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(LogRow::into_domain).transpose()
    }

    async fn list_accrual_logs(&self, limit: i64) -> RepositoryResult<Vec<InterestCalculationLog>> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {} FROM interest_calculation_logs WHERE status = 'SUCCESS' \
             ORDER BY executed_at DESC LIMIT $1",
            LOG_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LogRow::into_domain).collect()
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn decode_error(err: crate::validation::ValidationError) -> RepositoryError {
    RepositoryError::Database(sqlx::Error::Decode(Box::new(err)))
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    number: String,
    account_type: String,
    name_prefix: String,
    first_name: String,
    last_name: String,
    account_name: Option<String>,
    national_id: String,
    balance: BigDecimal,
    last_seq: i64,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> RepositoryResult<Account> {
        Ok(Account::restore(
            self.id,
            AccountNumber::parse(&self.number).map_err(decode_error)?,
            self.account_type.parse::<AccountType>().map_err(decode_error)?,
            HolderInfo {
                name_prefix: self.name_prefix,
                first_name: self.first_name,
                last_name: self.last_name,
                account_name: self.account_name,
                national_id: self.national_id,
            },
            self.balance,
            self.last_seq,
            self.created_at,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    seq: i64,
    kind: String,
    amount: BigDecimal,
    balance_after: BigDecimal,
    staff_id: String,
    printed: bool,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let kind: TransactionKind = self.kind.parse().map_err(decode_error)?;
        Ok(Transaction::restore(
            self.id,
            self.account_id,
            self.seq,
            kind,
            self.amount,
            self.balance_after,
            self.staff_id,
            self.printed,
            self.created_at,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InterestEntryRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    account_number: String,
}

impl InterestEntryRow {
    fn into_domain(self) -> RepositoryResult<InterestEntry> {
        Ok(InterestEntry {
            account_number: AccountNumber::parse(&self.account_number).map_err(decode_error)?,
            entry: self.transaction.into_domain()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    period_identifier: String,
    account_type: String,
    staff_id: String,
    status: String,
    rate: BigDecimal,
    accounts_affected: i64,
    total_interest_paid: BigDecimal,
    posted_at: DateTime<Utc>,
    executed_at: DateTime<Utc>,
}

impl LogRow {
    fn into_domain(self) -> RepositoryResult<InterestCalculationLog> {
        let status: AccrualStatus = self.status.parse().map_err(decode_error)?;
        Ok(InterestCalculationLog {
            id: self.id,
            period_identifier: PeriodIdentifier::parse(&self.period_identifier)
                .map_err(decode_error)?,
            account_type: self.account_type.parse::<AccountType>().map_err(decode_error)?,
            staff_id: self.staff_id,
            status,
            rate: self.rate,
            accounts_affected: self.accounts_affected,
            total_interest_paid: self.total_interest_paid,
            posted_at: self.posted_at,
            executed_at: self.executed_at,
        })
    }
}
