use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{Account, AccountNumber, Transaction, TransactionKind};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::LedgerStore;
use crate::services::ledger::{apply_entry, with_retry};
use crate::validation;

/// Posts manual DEPOSIT and WITHDRAW entries.
#[derive(Clone)]
pub struct TransactionEngine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl TransactionEngine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the account as it stands after the entry, and the entry.
    pub async fn transact(
        &self,
        account_number: &str,
        amount: &BigDecimal,
        kind: TransactionKind,
        staff_id: &str,
    ) -> LedgerResult<(Account, Transaction)> {
        if kind == TransactionKind::Interest {
            return Err(LedgerError::InvalidInput(
                "INTEREST entries are only posted by the accrual run".to_string(),
            ));
        }
        validation::validate_staff_id(staff_id)?;
        validation::validate_positive_amount(amount)?;
        let number = AccountNumber::parse(account_number)?;

        let result = with_retry("transact", || self.transact_once(&number, amount, kind, staff_id)).await;

        match &result {
            Ok((account, entry)) => tracing::info!(
                account = %account.number,
                kind = %entry.kind,
                amount = %entry.amount(),
                balance_after = %entry.balance_after(),
                seq = entry.seq,
                staff_id,
                "Transaction posted"
            ),
            Err(LedgerError::InsufficientFunds { requested, available, .. }) => tracing::warn!(
                account = %number,
                requested = %requested,
                available = %available,
                "Withdrawal refused"
            ),
            Err(LedgerError::Storage(e)) => {
                tracing::error!(account = %number, error = %e, "Transaction failed")
            }
            Err(_) => {}
        }

        result
    }

    async fn transact_once(
        &self,
        number: &AccountNumber,
        amount: &BigDecimal,
        kind: TransactionKind,
        staff_id: &str,
    ) -> LedgerResult<(Account, Transaction)> {
        let mut unit = self.store.begin().await?;
        let mut account = unit
            .lock_account(number)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", number)))?;

        let entry = apply_entry(
            unit.as_mut(),
            &mut account,
            kind,
            amount,
            staff_id,
            self.clock.now(),
        )
        .await?;

        unit.commit().await?;
        Ok((account, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerStore;
    use crate::clock::FixedClock;
    use crate::domain::{AccountType, HolderInfo};
    use crate::services::accounts::{AccountService, OpenAccountRequest};
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    async fn setup(deposit: i64) -> (TransactionEngine, AccountService, String) {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 2, 11, 30, 0).unwrap()));
        let accounts = AccountService::new(store.clone(), clock.clone(), "101".to_string());
        let (account, _) = accounts
            .open_account(OpenAccountRequest {
                account_type: AccountType::Current,
                holder: HolderInfo {
                    name_prefix: "Mr.".to_string(),
                    first_name: "Anan".to_string(),
                    last_name: "Srisuk".to_string(),
                    account_name: Some("Anan Trading".to_string()),
                    national_id: "3100600123456".to_string(),
                },
                initial_deposit: BigDecimal::from(deposit),
                staff_id: "teller-1".to_string(),
            })
            .await
            .unwrap();

        (
            TransactionEngine::new(store, clock),
            accounts,
            account.number.to_string(),
        )
    }

    #[tokio::test]
    async fn deposit_and_withdraw_move_balance() {
        let (engine, _, number) = setup(100).await;

        let (account, entry) = engine
            .transact(&number, &BigDecimal::from(50), TransactionKind::Deposit, "teller-1")
            .await
            .unwrap();
        assert_eq!(account.balance(), &BigDecimal::from(150));
        assert_eq!(entry.seq, 2);

        let (account, entry) = engine
            .transact(&number, &BigDecimal::from(150), TransactionKind::Withdraw, "teller-1")
            .await
            .unwrap();
        assert_eq!(account.balance(), &BigDecimal::from(0));
        assert_eq!(entry.balance_after(), &BigDecimal::from(0));
    }

    #[tokio::test]
    async fn overdraw_leaves_history_untouched() {
        let (engine, accounts, number) = setup(100).await;

        let err = engine
            .transact(&number, &BigDecimal::from(101), TransactionKind::Withdraw, "teller-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        let (account, history) = accounts.list_transactions(&number).await.unwrap();
        assert_eq!(account.balance(), &BigDecimal::from(100));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn interest_cannot_be_posted_manually() {
        let (engine, _, number) = setup(100).await;
        let err = engine
            .transact(&number, &BigDecimal::from(1), TransactionKind::Interest, "teller-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let (engine, _, _) = setup(100).await;
        let err = engine
            .transact("2020000000", &BigDecimal::from(1), TransactionKind::Deposit, "teller-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn sub_cent_amounts_are_refused_before_any_write() {
        let (engine, accounts, number) = setup(100).await;
        let amount = BigDecimal::from_str("0.001").unwrap();

        let err = engine
            .transact(&number, &amount, TransactionKind::Deposit, "teller-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        let (account, history) = accounts.list_transactions(&number).await.unwrap();
        assert_eq!(account.balance(), &BigDecimal::from(100));
        assert_eq!(history.len(), 1);
    }
}
