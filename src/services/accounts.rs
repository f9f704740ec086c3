use bigdecimal::BigDecimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{Account, AccountNumber, AccountType, HolderInfo, Transaction, TransactionKind};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{LedgerStore, LedgerUnit};
use crate::services::ledger::{apply_entry, with_retry};
use crate::validation;

/// Collision retries when drawing a fresh account number.
pub const ACCOUNT_NUMBER_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
pub struct OpenAccountRequest {
    pub account_type: AccountType,
    pub holder: HolderInfo,
    pub initial_deposit: BigDecimal,
    pub staff_id: String,
}

/// Account opening, lookup and passbook print status.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    issuer_prefix: String,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, issuer_prefix: String) -> Self {
        Self {
            store,
            clock,
            issuer_prefix,
        }
    }

    /// Creates the account and posts its opening DEPOSIT in one unit.
    pub async fn open_account(
        &self,
        request: OpenAccountRequest,
    ) -> LedgerResult<(Account, Transaction)> {
        validation::validate_staff_id(&request.staff_id)?;
        validation::validate_positive_amount(&request.initial_deposit)?;
        let holder = request.holder.normalized()?;

        let (account, entry) = with_retry("open_account", || {
            self.open_once(
                request.account_type,
                &holder,
                &request.initial_deposit,
                &request.staff_id,
            )
        })
        .await?;

        tracing::info!(
            account = %account.number,
            account_type = %account.account_type,
            initial_deposit = %entry.amount(),
            staff_id = %entry.staff_id,
            "Account opened"
        );

        Ok((account, entry))
    }

    async fn open_once(
        &self,
        account_type: AccountType,
        holder: &HolderInfo,
        initial_deposit: &BigDecimal,
        staff_id: &str,
    ) -> LedgerResult<(Account, Transaction)> {
        let mut unit = self.store.begin().await?;
        let number = self.draw_account_number(unit.as_mut()).await?;
        let now = self.clock.now();

        let mut account = Account::open(number, account_type, holder.clone(), now);
        unit.insert_account(&account).await?;
        let entry = apply_entry(
            unit.as_mut(),
            &mut account,
            TransactionKind::Deposit,
            initial_deposit,
            staff_id,
            now,
        )
        .await?;

        unit.commit().await?;
        Ok((account, entry))
    }

    async fn draw_account_number(&self, unit: &mut dyn LedgerUnit) -> LedgerResult<AccountNumber> {
        for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
            let candidate = {
                let mut rng = rand::thread_rng();
                AccountNumber::generate(&self.issuer_prefix, &mut rng)
            };
            if !unit.account_number_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(candidate = %candidate, "Account number collision");
        }

        Err(LedgerError::PersistenceConflict(format!(
            "no free account number after {} attempts",
            ACCOUNT_NUMBER_ATTEMPTS
        )))
    }

    pub async fn get_account(&self, number: &str) -> LedgerResult<Account> {
        let number = AccountNumber::parse(number)?;
        self.store
            .find_account(&number)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", number)))
    }

    /// The account with its full history in posting order.
    pub async fn list_transactions(&self, number: &str) -> LedgerResult<(Account, Vec<Transaction>)> {
        let account = self.get_account(number).await?;
        let transactions = self.store.list_transactions(account.id).await?;
        Ok((account, transactions))
    }

    pub async fn list_unprinted(&self, number: &str) -> LedgerResult<(Account, Vec<Transaction>)> {
        let (account, transactions) = self.list_transactions(number).await?;
        let unprinted = transactions.into_iter().filter(|t| !t.printed).collect();
        Ok((account, unprinted))
    }

    /// Sets the passbook flag on every listed entry, or on none of them.
    pub async fn mark_printed(&self, ids: &[Uuid], printed: bool) -> LedgerResult<u64> {
        let ids: Vec<Uuid> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Err(LedgerError::InvalidInput(
                "at least one transaction id is required".to_string(),
            ));
        }

        let updated = with_retry("mark_printed", || async {
            let mut unit = self.store.begin().await?;
            let updated = unit.set_printed(&ids, printed).await?;
            unit.commit().await?;
            Ok::<_, LedgerError>(updated)
        })
        .await?;

        tracing::info!(updated, printed, "Passbook print status updated");
        Ok(updated)
    }
}
