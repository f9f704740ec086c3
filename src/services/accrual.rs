use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::interest::interest_on;
use crate::domain::{
    AccountType, AccrualPolicy, AccrualStatus, InterestCalculationLog, PeriodIdentifier,
    TransactionKind,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::LedgerStore;
use crate::services::ledger::{apply_entry, with_retry};
use crate::services::rates::RateRegistry;
use crate::validation;

pub const DEFAULT_LOG_LIMIT: i64 = 10;
pub const MAX_LOG_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct AccrualRequest {
    pub account_type: AccountType,
    pub late_calculation: bool,
    pub target_year: Option<i32>,
    pub staff_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccrualOutcome {
    pub period_identifier: PeriodIdentifier,
    pub rate: BigDecimal,
    pub accounts_affected: i64,
    /// FIXED accounts that forfeited interest through a withdrawal in the
    /// penalty window.
    pub accounts_excluded: i64,
    pub total_interest_paid: BigDecimal,
    pub executed_at: DateTime<Utc>,
}

/// Posts yearly interest for one account type, at most once per period.
///
/// A run is a single unit of work: every INTEREST entry and the period's
/// log commit together or not at all, so a failed run leaves no log behind
/// and can simply be repeated.
#[derive(Clone)]
pub struct AccrualEngine {
    store: Arc<dyn LedgerStore>,
    rates: RateRegistry,
    clock: Arc<dyn Clock>,
    policy: AccrualPolicy,
}

impl AccrualEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rates: RateRegistry,
        clock: Arc<dyn Clock>,
        policy: AccrualPolicy,
    ) -> Self {
        Self {
            store,
            rates,
            clock,
            policy,
        }
    }

    pub async fn accrue(&self, request: AccrualRequest) -> LedgerResult<AccrualOutcome> {
        validation::validate_staff_id(&request.staff_id)?;
        if !request.account_type.accrues_interest() {
            return Err(LedgerError::InvalidInput(format!(
                "{} accounts have no accrual cycle",
                request.account_type
            )));
        }

        let year = self.policy.resolve_year(
            self.clock.now(),
            request.late_calculation,
            request.target_year,
        )?;
        let period = PeriodIdentifier::new(year, request.account_type);

        let result = with_retry("accrue_interest", || self.run_once(&period, &request.staff_id)).await;

        match &result {
            Ok(outcome) => tracing::info!(
                period = %outcome.period_identifier,
                rate = %outcome.rate,
                accounts_affected = outcome.accounts_affected,
                accounts_excluded = outcome.accounts_excluded,
                total_interest_paid = %outcome.total_interest_paid,
                staff_id = %request.staff_id,
                "Interest accrual completed"
            ),
            Err(LedgerError::Storage(e)) => tracing::error!(
                period = %period,
                error = %e,
                "Interest accrual aborted, nothing was posted"
            ),
            Err(e) => tracing::warn!(period = %period, error = %e, "Interest accrual refused"),
        }

        result
    }

    async fn run_once(&self, period: &PeriodIdentifier, staff_id: &str) -> LedgerResult<AccrualOutcome> {
        let account_type = period.account_type();
        let mut unit = self.store.begin().await?;

        if unit.accrual_log(period).await?.is_some() {
            return Err(LedgerError::AlreadyAccrued(period.to_string()));
        }

        let rate = self.rates.require_rate(account_type).await?.rate;
        let posted_at = self.clock.now();
        let penalty_window = (account_type == AccountType::Fixed)
            .then(|| self.policy.penalty_window(period.year(), posted_at));

        let zero = BigDecimal::from(0);
        let mut accounts_affected = 0i64;
        let mut accounts_excluded = 0i64;
        let mut total_interest_paid = BigDecimal::from(0);

        for mut account in unit.lock_accounts_of_type(account_type).await? {
            if let Some((from, to)) = penalty_window {
                if unit.has_withdrawal_between(account.id, from, to).await? {
                    tracing::debug!(
                        account = %account.number,
                        period = %period,
                        "Withdrawal inside penalty window, interest forfeited"
                    );
                    accounts_excluded += 1;
                    continue;
                }
            }

            let interest = interest_on(account.balance(), &rate);
            if interest <= zero {
                continue;
            }

            apply_entry(
                unit.as_mut(),
                &mut account,
                TransactionKind::Interest,
                &interest,
                staff_id,
                posted_at,
            )
            .await?;

            accounts_affected += 1;
            total_interest_paid += interest;
        }

        let log = InterestCalculationLog {
            id: Uuid::new_v4(),
            period_identifier: period.clone(),
            account_type,
            staff_id: staff_id.to_string(),
            status: AccrualStatus::Success,
            rate: rate.clone(),
            accounts_affected,
            total_interest_paid: total_interest_paid.clone(),
            posted_at,
            executed_at: self.clock.now(),
        };
        unit.insert_accrual_log(&log).await?;
        unit.commit().await?;

        Ok(AccrualOutcome {
            period_identifier: log.period_identifier,
            rate,
            accounts_affected,
            accounts_excluded,
            total_interest_paid,
            executed_at: log.executed_at,
        })
    }

    /// Completed runs, newest first.
    pub async fn list_logs(&self, limit: Option<i64>) -> LedgerResult<Vec<InterestCalculationLog>> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
        Ok(self.store.list_accrual_logs(limit).await?)
    }
}
