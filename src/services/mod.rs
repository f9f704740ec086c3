pub mod accounts;
pub mod accrual;
pub mod correction;
pub mod ledger;
pub mod rates;
pub mod transaction_engine;

pub use accounts::{AccountService, OpenAccountRequest};
pub use accrual::{AccrualEngine, AccrualOutcome, AccrualRequest};
pub use correction::{
    ApprovedCorrection, CorrectionEngine, CorrectionItem, CorrectionOutcome, CorrectionPreview,
    SkippedEntry,
};
pub use rates::RateRegistry;
pub use transaction_engine::TransactionEngine;
