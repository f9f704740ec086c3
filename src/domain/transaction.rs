//! Ledger entry entity.
//! Entries are immutable once written; only an interest correction may
//! rewrite `amount` and `balance_after`, and only through `Account::reprice`.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Interest,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdraw => "WITHDRAW",
            TransactionKind::Interest => "INTEREST",
        }
    }

    /// Contribution of an entry of this kind to the account balance.
    pub fn signed(&self, amount: &BigDecimal) -> BigDecimal {
        match self {
            TransactionKind::Deposit | TransactionKind::Interest => amount.clone(),
            TransactionKind::Withdraw => -amount.clone(),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(TransactionKind::Deposit),
            "WITHDRAW" => Ok(TransactionKind::Withdraw),
            "INTEREST" => Ok(TransactionKind::Interest),
            _ => Err(ValidationError::new(
                "kind",
                "must be one of: DEPOSIT, WITHDRAW, INTEREST",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    /// 1-based position in the owning account's history.
    pub seq: i64,
    pub kind: TransactionKind,
    amount: BigDecimal,
    balance_after: BigDecimal,
    pub staff_id: String,
    pub printed: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub(crate) fn new(
        account_id: Uuid,
        seq: i64,
        kind: TransactionKind,
        amount: BigDecimal,
        balance_after: BigDecimal,
        staff_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            seq,
            kind,
            amount,
            balance_after,
            staff_id,
            printed: false,
            created_at,
        }
    }

    /// Rebuilds a persisted entry. Only storage adapters should call this.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: Uuid,
        account_id: Uuid,
        seq: i64,
        kind: TransactionKind,
        amount: BigDecimal,
        balance_after: BigDecimal,
        staff_id: String,
        printed: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            seq,
            kind,
            amount,
            balance_after,
            staff_id,
            printed,
            created_at,
        }
    }

    pub fn amount(&self) -> &BigDecimal {
        &self.amount
    }

    pub fn balance_after(&self) -> &BigDecimal {
        &self.balance_after
    }

    pub fn signed_amount(&self) -> BigDecimal {
        self.kind.signed(&self.amount)
    }

    /// The balance this entry was applied on top of.
    pub fn balance_before(&self) -> BigDecimal {
        self.balance_after.clone() - self.signed_amount()
    }

    pub(crate) fn rewrite(&mut self, amount: BigDecimal, balance_after: BigDecimal) {
        self.amount = amount;
        self.balance_after = balance_after;
    }
}

/// Sum of signed amounts in history order. For a consistent account this
/// equals its current balance.
pub fn fold_balance<'a>(entries: impl IntoIterator<Item = &'a Transaction>) -> BigDecimal {
    let mut ordered: Vec<&Transaction> = entries.into_iter().collect();
    ordered.sort_by_key(|t| t.seq);
    ordered
        .into_iter()
        .fold(BigDecimal::from(0), |acc, t| acc + t.signed_amount())
}
