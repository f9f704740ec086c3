use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{AccountType, InterestRate};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::RateStore;
use crate::validation;

/// Current interest rate per account type. Engines read through here at the
/// moment they run; nothing is cached.
#[derive(Clone)]
pub struct RateRegistry {
    store: Arc<dyn RateStore>,
    clock: Arc<dyn Clock>,
}

impl RateRegistry {
    pub fn new(store: Arc<dyn RateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn set_rate(
        &self,
        account_type: AccountType,
        rate: &BigDecimal,
    ) -> LedgerResult<InterestRate> {
        validation::validate_rate(rate)?;

        let saved = self
            .store
            .upsert(account_type, rate, self.clock.now())
            .await?;

        tracing::info!(
            account_type = %account_type,
            rate = %saved.rate,
            "Interest rate updated"
        );

        Ok(saved)
    }

    pub async fn get_rate(&self, account_type: AccountType) -> LedgerResult<Option<InterestRate>> {
        Ok(self.store.get(account_type).await?)
    }

    pub async fn list_rates(&self) -> LedgerResult<Vec<InterestRate>> {
        Ok(self.store.list().await?)
    }

    /// The configured rate, or `RateNotConfigured`. There is no default.
    pub async fn require_rate(&self, account_type: AccountType) -> LedgerResult<InterestRate> {
        self.get_rate(account_type)
            .await?
            .ok_or(LedgerError::RateNotConfigured(account_type))
    }
}
