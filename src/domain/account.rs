//! Account entity and the single balance-mutation primitive.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::transaction::{Transaction, TransactionKind};
use crate::error::{LedgerError, LedgerResult};
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Fixed,
    Current,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [AccountType::Savings, AccountType::Fixed, AccountType::Current];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Fixed => "FIXED",
            AccountType::Current => "CURRENT",
        }
    }

    /// Only SAVINGS and FIXED accounts earn periodic interest.
    pub fn accrues_interest(&self) -> bool {
        matches!(self, AccountType::Savings | AccountType::Fixed)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAVINGS" => Ok(AccountType::Savings),
            "FIXED" => Ok(AccountType::Fixed),
            "CURRENT" => Ok(AccountType::Current),
            _ => Err(ValidationError::new(
                "account_type",
                "must be one of: SAVINGS, FIXED, CURRENT",
            )),
        }
    }
}

/// Ten-digit, human-facing account number: issuer prefix (3) + 6 random
/// digits + 1 random digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        validation::validate_account_number(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn generate<R: Rng + ?Sized>(issuer_prefix: &str, rng: &mut R) -> Self {
        let body: u32 = rng.gen_range(0..1_000_000);
        let tail: u8 = rng.gen_range(0..10);
        Self(format!("{}{:06}{}", issuer_prefix, body, tail))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderInfo {
    pub name_prefix: String,
    pub first_name: String,
    pub last_name: String,
    pub account_name: Option<String>,
    pub national_id: String,
}

impl HolderInfo {
    /// Sanitizes every field and validates the result.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let holder = Self {
            name_prefix: validation::sanitize_string(&self.name_prefix),
            first_name: validation::sanitize_string(&self.first_name),
            last_name: validation::sanitize_string(&self.last_name),
            account_name: self
                .account_name
                .map(|name| validation::sanitize_string(&name))
                .filter(|name| !name.is_empty()),
            national_id: validation::sanitize_string(&self.national_id),
        };

        validation::validate_max_len("name_prefix", &holder.name_prefix, validation::NAME_PREFIX_MAX_LEN)?;
        validation::validate_name("first_name", &holder.first_name)?;
        validation::validate_name("last_name", &holder.last_name)?;
        if let Some(name) = &holder.account_name {
            validation::validate_max_len("account_name", name, validation::NAME_MAX_LEN)?;
        }
        validation::validate_national_id(&holder.national_id)?;

        Ok(holder)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub number: AccountNumber,
    pub account_type: AccountType,
    #[serde(flatten)]
    pub holder: HolderInfo,
    balance: BigDecimal,
    last_seq: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A fresh account with an empty history. The opening deposit is posted
    /// through [`Account::post`] like any other entry.
    pub(crate) fn open(
        number: AccountNumber,
        account_type: AccountType,
        holder: HolderInfo,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            account_type,
            holder,
            balance: BigDecimal::from(0),
            last_seq: 0,
            created_at,
        }
    }

    /// Rebuilds a persisted account. Only storage adapters should call this.
    pub(crate) fn restore(
        id: Uuid,
        number: AccountNumber,
        account_type: AccountType,
        holder: HolderInfo,
        balance: BigDecimal,
        last_seq: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number,
            account_type,
            holder,
            balance,
            last_seq,
            created_at,
        }
    }

    pub fn balance(&self) -> &BigDecimal {
        &self.balance
    }

    pub fn last_seq(&self) -> i64 {
        self.last_seq
    }

    /// Applies one entry to the in-memory account and returns the entry to
    /// persist alongside it. This is the only place a balance moves forward.
    pub(crate) fn post(
        &mut self,
        kind: TransactionKind,
        amount: &BigDecimal,
        staff_id: &str,
        at: DateTime<Utc>,
    ) -> LedgerResult<Transaction> {
        validation::validate_positive_amount(amount)?;

        if kind == TransactionKind::Withdraw && amount > &self.balance {
            return Err(LedgerError::InsufficientFunds {
                account: self.number.to_string(),
                requested: amount.clone(),
                available: self.balance.clone(),
            });
        }

        let new_balance = self.balance.clone() + kind.signed(amount);
        let seq = self.last_seq + 1;

        let entry = Transaction::new(
            self.id,
            seq,
            kind,
            amount.clone(),
            new_balance.clone(),
            staff_id.to_string(),
            at,
        );

        self.balance = new_balance;
        self.last_seq = seq;

        Ok(entry)
    }

    /// Whether the live balance can take `delta` without going negative.
    /// FIXED balances are not floored.
    pub fn can_absorb(&self, delta: &BigDecimal) -> bool {
        self.account_type == AccountType::Fixed
            || self.balance.clone() + delta.clone() >= BigDecimal::from(0)
    }

    /// Rewrites a posted INTEREST entry to `new_amount` and carries the
    /// difference into the live balance. Returns the applied delta.
    pub(crate) fn reprice(
        &mut self,
        entry: &mut Transaction,
        new_amount: BigDecimal,
    ) -> LedgerResult<BigDecimal> {
        if entry.account_id != self.id {
            return Err(LedgerError::InvalidInput(format!(
                "transaction {} does not belong to account {}",
                entry.id, self.number
            )));
        }
        if entry.kind != TransactionKind::Interest {
            return Err(LedgerError::InvalidInput(format!(
                "transaction {} is {}, only INTEREST entries can be repriced",
                entry.id, entry.kind
            )));
        }
        if new_amount < BigDecimal::from(0) {
            return Err(LedgerError::InvalidInput(
                "repriced interest must not be negative".to_string(),
            ));
        }

        let delta = new_amount.clone() - entry.amount().clone();
        if !self.can_absorb(&delta) {
            return Err(LedgerError::InvalidInput(format!(
                "repricing by {} would take account {} below zero (balance {})",
                delta, self.number, self.balance
            )));
        }
        let new_balance = self.balance.clone() + delta.clone();

        let balance_after = entry.balance_after().clone() + delta.clone();
        entry.rewrite(new_amount, balance_after);
        self.balance = new_balance;

        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::str::FromStr;

    fn holder() -> HolderInfo {
        HolderInfo {
            name_prefix: "Ms.".to_string(),
            first_name: "Malee".to_string(),
            last_name: "Srisuk".to_string(),
            account_name: None,
            national_id: "1103700012345".to_string(),
        }
    }

    fn account(account_type: AccountType) -> Account {
        Account::open(
            AccountNumber::parse("1010000001").unwrap(),
            account_type,
            holder(),
            Utc::now(),
        )
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn generated_numbers_carry_issuer_prefix() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let number = AccountNumber::generate("101", &mut rng);
            assert!(number.as_str().starts_with("101"));
            assert!(AccountNumber::parse(number.as_str()).is_ok());
        }
    }

    #[test]
    fn parses_account_type() {
        assert_eq!("savings".parse::<AccountType>().unwrap(), AccountType::Savings);
        assert_eq!("FIXED".parse::<AccountType>().unwrap(), AccountType::Fixed);
        assert!("checking".parse::<AccountType>().is_err());
        assert!(!AccountType::Current.accrues_interest());
    }

    #[test]
    fn post_moves_balance_and_sequence() {
        let mut acct = account(AccountType::Savings);
        let first = acct.post(TransactionKind::Deposit, &dec("100.00"), "s1", Utc::now()).unwrap();
        let second = acct.post(TransactionKind::Withdraw, &dec("30.50"), "s1", Utc::now()).unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(second.balance_after(), &dec("69.50"));
        assert_eq!(acct.balance(), &dec("69.50"));
        assert_eq!(acct.last_seq(), 2);
    }

    #[test]
    fn overdraw_is_refused_without_mutation() {
        let mut acct = account(AccountType::Current);
        acct.post(TransactionKind::Deposit, &dec("100"), "s1", Utc::now()).unwrap();

        let err = acct
            .post(TransactionKind::Withdraw, &dec("100.01"), "s1", Utc::now())
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(acct.balance(), &dec("100"));
        assert_eq!(acct.last_seq(), 1);
    }

    #[test]
    fn withdrawing_exact_balance_is_allowed() {
        let mut acct = account(AccountType::Savings);
        acct.post(TransactionKind::Deposit, &dec("100"), "s1", Utc::now()).unwrap();
        acct.post(TransactionKind::Withdraw, &dec("100"), "s1", Utc::now()).unwrap();
        assert_eq!(acct.balance(), &dec("0"));
    }

    #[test]
    fn non_positive_amounts_are_invalid() {
        let mut acct = account(AccountType::Savings);
        let err = acct
            .post(TransactionKind::Deposit, &dec("0"), "s1", Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn reprice_keeps_fold_consistent() {
        let mut acct = account(AccountType::Savings);
        acct.post(TransactionKind::Deposit, &dec("1000"), "s1", Utc::now()).unwrap();
        let mut interest = acct
            .post(TransactionKind::Interest, &dec("10.00"), "s1", Utc::now())
            .unwrap();
        acct.post(TransactionKind::Deposit, &dec("50"), "s1", Utc::now()).unwrap();

        let delta = acct.reprice(&mut interest, dec("20.00")).unwrap();

        assert_eq!(delta, dec("10.00"));
        assert_eq!(interest.amount(), &dec("20.00"));
        assert_eq!(interest.balance_after(), &dec("1020.00"));
        assert_eq!(acct.balance(), &dec("1070.00"));
    }

    #[test]
    fn reprice_refuses_to_take_savings_below_zero() {
        let mut acct = account(AccountType::Savings);
        acct.post(TransactionKind::Deposit, &dec("1000"), "s1", Utc::now()).unwrap();
        let mut interest = acct
            .post(TransactionKind::Interest, &dec("20.00"), "s1", Utc::now())
            .unwrap();
        acct.post(TransactionKind::Withdraw, &dec("1015"), "s1", Utc::now()).unwrap();

        assert!(!acct.can_absorb(&dec("-20.00")));
        let err = acct.reprice(&mut interest, dec("0")).unwrap_err();

        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert_eq!(interest.amount(), &dec("20.00"));
        assert_eq!(acct.balance(), &dec("5.00"));
    }

    #[test]
    fn fixed_balances_absorb_any_delta() {
        let acct = account(AccountType::Fixed);
        assert!(acct.can_absorb(&dec("-1")));
    }

    #[test]
    fn reprice_rejects_non_interest_entries() {
        let mut acct = account(AccountType::Savings);
        let mut deposit = acct.post(TransactionKind::Deposit, &dec("10"), "s1", Utc::now()).unwrap();
        assert!(acct.reprice(&mut deposit, dec("5")).is_err());
    }

    #[test]
    fn holder_info_is_sanitized() {
        let raw = HolderInfo {
            name_prefix: " Mr. ".to_string(),
            first_name: "  Somchai\t".to_string(),
            last_name: "Jaidee".to_string(),
            account_name: Some("   ".to_string()),
            national_id: "1103700012345".to_string(),
        };
        let holder = raw.normalized().unwrap();
        assert_eq!(holder.first_name, "Somchai");
        assert_eq!(holder.name_prefix, "Mr.");
        assert_eq!(holder.account_name, None);
    }
}
