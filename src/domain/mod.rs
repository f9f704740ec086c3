//! Framework-agnostic ledger entities.

pub mod account;
pub mod interest;
pub mod transaction;

pub use account::{Account, AccountNumber, AccountType, HolderInfo};
pub use interest::{
    AccrualPolicy, AccrualStatus, InterestCalculationLog, InterestRate, PeriodIdentifier,
};
pub use transaction::{Transaction, TransactionKind};
