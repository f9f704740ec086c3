//! Interest rates, accrual periods and the calendar policy that governs them.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::account::AccountType;
use crate::error::{LedgerError, LedgerResult};
use crate::validation::{ValidationError, MONEY_SCALE};

/// Interest earned by `balance` at `rate` for one period, rounded to cents.
pub fn interest_on(balance: &BigDecimal, rate: &BigDecimal) -> BigDecimal {
    (balance * rate).round(MONEY_SCALE)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestRate {
    pub account_type: AccountType,
    pub rate: BigDecimal,
    pub updated_at: DateTime<Utc>,
}

/// `<year>-<ACCOUNT TYPE>`, e.g. `2024-SAVINGS`. One SUCCESS log may exist
/// per identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct PeriodIdentifier {
    year: i32,
    account_type: AccountType,
}

impl PeriodIdentifier {
    pub fn new(year: i32, account_type: AccountType) -> Self {
        Self { year, account_type }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::new("period_identifier", "must look like 2024-SAVINGS");
        let (year, account_type) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        if !(1900..=9999).contains(&year) {
            return Err(invalid());
        }
        let account_type = account_type.parse::<AccountType>()?;
        Ok(Self { year, account_type })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }
}

impl fmt::Display for PeriodIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.account_type)
    }
}

impl From<PeriodIdentifier> for String {
    fn from(period: PeriodIdentifier) -> Self {
        period.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    Success,
}

impl AccrualStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccrualStatus::Success => "SUCCESS",
        }
    }
}

impl std::str::FromStr for AccrualStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(AccrualStatus::Success),
            _ => Err(ValidationError::new("status", "unknown accrual status")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestCalculationLog {
    pub id: Uuid,
    pub period_identifier: PeriodIdentifier,
    pub account_type: AccountType,
    pub staff_id: String,
    pub status: AccrualStatus,
    pub rate: BigDecimal,
    pub accounts_affected: i64,
    pub total_interest_paid: BigDecimal,
    /// Timestamp stamped on every INTEREST entry of the run.
    pub posted_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
}

/// Calendar rules for when accrual may run and which withdrawals forfeit
/// FIXED interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualPolicy {
    /// Month (1-12) in which the current year's accrual normally runs.
    pub accrual_month: u32,
    /// Days after the start of the period year during which a FIXED
    /// withdrawal does not forfeit interest.
    pub fixed_penalty_grace_days: u32,
}

impl Default for AccrualPolicy {
    fn default() -> Self {
        Self {
            accrual_month: 12,
            fixed_penalty_grace_days: 10,
        }
    }
}

impl AccrualPolicy {
    /// Resolves the period year for a run at `now`. Inside the accrual month
    /// the current year is used and the late flag is ignored; outside it only
    /// the immediately preceding year may be accrued, and only on request.
    pub fn resolve_year(
        &self,
        now: DateTime<Utc>,
        late_calculation: bool,
        target_year: Option<i32>,
    ) -> LedgerResult<i32> {
        let current_year = now.year();
        let previous_year = current_year - 1;

        if now.month() == self.accrual_month {
            return Ok(current_year);
        }

        match (late_calculation, target_year) {
            (true, Some(year)) if year == previous_year => Ok(year),
            (true, Some(year)) => Err(LedgerError::OutOfWindow {
                reason: format!(
                    "late calculation is only allowed for {}, not {}",
                    previous_year, year
                ),
                previous_year,
            }),
            _ => Err(LedgerError::OutOfWindow {
                reason: format!(
                    "interest may only be accrued in month {}; request a late calculation for {}",
                    self.accrual_month, previous_year
                ),
                previous_year,
            }),
        }
    }

    /// Withdrawals from a FIXED account inside `[start, now]` exclude it from
    /// the run for period `year`.
    pub fn penalty_window(&self, year: i32, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let period_start = NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now);
        let start = period_start + Duration::days(i64::from(self.fixed_penalty_grace_days));
        (start, now)
    }
}
