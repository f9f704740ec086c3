//! Repricing of a completed accrual period at the current rate.
//!
//! Correction is two-phase. [`CorrectionEngine::preview`] is a pure
//! computation over the period's INTEREST entries; the preview must then be
//! approved by a staff member, and only an [`ApprovedCorrection`] can be
//! executed. Execution rewrites posted entries one by one and cannot be
//! undone.
//!
//! The principal an entry was computed against is taken to be
//! `balance_after - amount`. That is exact only while no other entry of the
//! same account shares the posting instant, which holds for entries written
//! by the accrual run.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::interest::interest_on;
use crate::domain::{AccountNumber, AccountType, InterestCalculationLog, PeriodIdentifier};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{InterestEntry, LedgerStore, LedgerUnit};
use crate::services::ledger::with_retry;
use crate::services::rates::RateRegistry;
use crate::validation;

/// Items shown to the approver alongside the totals.
pub const SAMPLE_ITEMS: usize = 5;

/// Deltas smaller than this are left alone.
fn correction_epsilon() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(10_000)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionItem {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub account_number: AccountNumber,
    pub implied_principal: BigDecimal,
    pub old_amount: BigDecimal,
    pub new_amount: BigDecimal,
    pub delta: BigDecimal,
}

impl CorrectionItem {
    fn from_entry(interest: &InterestEntry, rate: &BigDecimal) -> Self {
        let entry = &interest.entry;
        // balance_after - amount for an INTEREST entry
        let implied_principal = entry.balance_before();
        let new_amount = interest_on(&implied_principal, rate);
        let delta = new_amount.clone() - entry.amount().clone();

        Self {
            transaction_id: entry.id,
            account_id: entry.account_id,
            account_number: interest.account_number.clone(),
            implied_principal,
            old_amount: entry.amount().clone(),
            new_amount,
            delta,
        }
    }

    pub fn needs_rewrite(&self) -> bool {
        self.delta.abs() >= correction_epsilon()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionPreview {
    pub period_identifier: PeriodIdentifier,
    pub account_type: AccountType,
    pub target_rate: BigDecimal,
    pub affected_count: usize,
    pub total_old: BigDecimal,
    pub total_new: BigDecimal,
    pub net_change: BigDecimal,
    pub sample_items: Vec<CorrectionItem>,
    #[serde(skip)]
    pub items: Vec<CorrectionItem>,
}

impl CorrectionPreview {
    fn compute(log: &InterestCalculationLog, target_rate: BigDecimal, entries: &[InterestEntry]) -> Self {
        let items: Vec<CorrectionItem> = entries
            .iter()
            .map(|entry| CorrectionItem::from_entry(entry, &target_rate))
            .collect();

        let mut total_old = BigDecimal::from(0);
        let mut total_new = BigDecimal::from(0);
        for item in &items {
            total_old += item.old_amount.clone();
            total_new += item.new_amount.clone();
        }
        let net_change = total_new.clone() - total_old.clone();

        Self {
            period_identifier: log.period_identifier.clone(),
            account_type: log.account_type,
            target_rate,
            affected_count: items.len(),
            total_old,
            total_new,
            net_change,
            sample_items: items.iter().take(SAMPLE_ITEMS).cloned().collect(),
            items,
        }
    }
}

/// A preview a staff member has signed off on. The only input `execute`
/// accepts.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedCorrection {
    pub preview: CorrectionPreview,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

/// An entry execution left untouched because rewriting it would take a
/// SAVINGS or CURRENT balance below zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub transaction_id: Uuid,
    pub account_number: AccountNumber,
    pub delta: BigDecimal,
    pub available: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionOutcome {
    pub period_identifier: PeriodIdentifier,
    pub target_rate: BigDecimal,
    pub updated_count: usize,
    pub skipped: Vec<SkippedEntry>,
    pub net_change: BigDecimal,
    pub executed_by: String,
    pub irreversible: bool,
}

enum Repricing {
    Rewritten(BigDecimal),
    Unchanged,
    Skipped(SkippedEntry),
}

#[derive(Clone)]
pub struct CorrectionEngine {
    store: Arc<dyn LedgerStore>,
    rates: RateRegistry,
    clock: Arc<dyn Clock>,
}

impl CorrectionEngine {
    pub fn new(store: Arc<dyn LedgerStore>, rates: RateRegistry, clock: Arc<dyn Clock>) -> Self {
        Self { store, rates, clock }
    }

    /// Recomputes the period at the current rate without writing anything.
    pub async fn preview(&self, period_identifier: &str) -> LedgerResult<CorrectionPreview> {
        let period = PeriodIdentifier::parse(period_identifier)?;
        let log = self.require_log(&period).await?;
        let rate = self.rates.require_rate(log.account_type).await?.rate;

        // Read under lock so the preview matches what execute would see; the
        // unit is dropped without committing.
        let mut unit = self.store.begin().await?;
        let entries = period_entries(unit.as_mut(), &log).await?;
        drop(unit);

        Ok(CorrectionPreview::compute(&log, rate, &entries))
    }

    pub fn approve(&self, preview: CorrectionPreview, staff_id: &str) -> LedgerResult<ApprovedCorrection> {
        validation::validate_staff_id(staff_id)?;
        Ok(ApprovedCorrection {
            preview,
            approved_by: staff_id.to_string(),
            approved_at: self.clock.now(),
        })
    }

    /// Reprices the approved period at the approved rate. Each entry is
    /// rewritten in its own unit together with its account's live balance.
    /// Entries whose account cannot absorb a negative delta are left as they
    /// are and reported in `skipped`; a later execute picks them up once the
    /// account is funded again, since rewritten entries no longer differ.
    ///
    /// Refused up front, with nothing written, if the rate moved since the
    /// preview was approved.
    pub async fn execute(&self, approved: &ApprovedCorrection) -> LedgerResult<CorrectionOutcome> {
        let period = &approved.preview.period_identifier;
        let target_rate = &approved.preview.target_rate;

        let log = self.require_log(period).await?;
        let rate = self.rates.require_rate(log.account_type).await?.rate;
        if &rate != target_rate {
            return Err(LedgerError::PersistenceConflict(format!(
                "{} rate changed from {} to {} since the preview was approved",
                log.account_type, target_rate, rate
            )));
        }

        tracing::warn!(
            period = %period,
            target_rate = %target_rate,
            approved_by = %approved.approved_by,
            "Executing interest correction, history will be rewritten"
        );

        let mut unit = self.store.begin().await?;
        let entry_ids: Vec<Uuid> = period_entries(unit.as_mut(), &log)
            .await?
            .into_iter()
            .map(|interest| interest.entry.id)
            .collect();
        drop(unit);

        let mut updated_count = 0;
        let mut net_change = BigDecimal::from(0);
        let mut skipped = Vec::new();

        for transaction_id in entry_ids {
            let repricing = with_retry("reprice_interest_entry", || {
                self.reprice_entry(transaction_id, target_rate)
            })
            .await?;

            match repricing {
                Repricing::Rewritten(delta) => {
                    updated_count += 1;
                    net_change += delta;
                }
                Repricing::Unchanged => {}
                Repricing::Skipped(entry) => {
                    tracing::warn!(
                        period = %period,
                        account = %entry.account_number,
                        transaction_id = %entry.transaction_id,
                        delta = %entry.delta,
                        available = %entry.available,
                        "Interest entry left unrepriced, balance cannot absorb the delta"
                    );
                    skipped.push(entry);
                }
            }
        }

        let outcome = CorrectionOutcome {
            period_identifier: log.period_identifier,
            target_rate: rate,
            updated_count,
            skipped,
            net_change,
            executed_by: approved.approved_by.clone(),
            irreversible: true,
        };

        tracing::info!(
            period = %outcome.period_identifier,
            updated_count = outcome.updated_count,
            skipped_count = outcome.skipped.len(),
            net_change = %outcome.net_change,
            executed_by = %outcome.executed_by,
            "Interest correction committed"
        );

        Ok(outcome)
    }

    async fn reprice_entry(&self, transaction_id: Uuid, rate: &BigDecimal) -> LedgerResult<Repricing> {
        let mut unit = self.store.begin().await?;

        let entry = unit
            .lock_interest_entry(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("interest entry {}", transaction_id)))?;
        let mut account = unit
            .lock_account_by_id(entry.account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", entry.account_id)))?;

        let interest = InterestEntry {
            entry,
            account_number: account.number.clone(),
        };
        let item = CorrectionItem::from_entry(&interest, rate);
        if !item.needs_rewrite() {
            return Ok(Repricing::Unchanged);
        }
        if !account.can_absorb(&item.delta) {
            return Ok(Repricing::Skipped(SkippedEntry {
                transaction_id,
                account_number: item.account_number,
                delta: item.delta,
                available: account.balance().clone(),
            }));
        }

        let mut entry = interest.entry;
        let delta = account.reprice(&mut entry, item.new_amount)?;
        unit.save_repriced_entry(&account, &entry).await?;
        unit.commit().await?;

        tracing::debug!(
            account = %account.number,
            transaction_id = %entry.id,
            delta = %delta,
            "Interest entry repriced"
        );

        Ok(Repricing::Rewritten(delta))
    }

    async fn require_log(&self, period: &PeriodIdentifier) -> LedgerResult<InterestCalculationLog> {
        self.store
            .find_accrual_log(period)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("accrual log {}", period)))
    }
}

async fn period_entries(
    unit: &mut dyn LedgerUnit,
    log: &InterestCalculationLog,
) -> LedgerResult<Vec<InterestEntry>> {
    Ok(unit
        .lock_interest_entries(log.account_type, log.posted_at, log.executed_at)
        .await?)
}
