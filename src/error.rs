use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use serde_json::json;
use thiserror::Error;

use crate::domain::AccountType;
use crate::ports::RepositoryError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Every failure leaves the ledger untouched; callers may retry after
/// fixing the cause.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient funds in account {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: String,
        requested: BigDecimal,
        available: BigDecimal,
    },

    #[error("Interest for period {0} has already been accrued")]
    AlreadyAccrued(String),

    #[error("No interest rate configured for {0} accounts")]
    RateNotConfigured(AccountType),

    #[error("Accrual outside its permitted window: {reason}")]
    OutOfWindow { reason: String, previous_year: i32 },

    #[error("Concurrent update conflict: {0}")]
    PersistenceConflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::AlreadyAccrued(_) => StatusCode::CONFLICT,
            LedgerError::RateNotConfigured(_) => StatusCode::PRECONDITION_FAILED,
            LedgerError::OutOfWindow { .. } => StatusCode::BAD_REQUEST,
            LedgerError::PersistenceConflict(_) => StatusCode::CONFLICT,
            LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable tag for the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::InvalidInput(_) => "invalid_input",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::AlreadyAccrued(_) => "already_accrued",
            LedgerError::RateNotConfigured(_) => "rate_not_configured",
            LedgerError::OutOfWindow { .. } => "out_of_window",
            LedgerError::PersistenceConflict(_) => "persistence_conflict",
            LedgerError::Unauthorized(_) => "unauthorized",
            LedgerError::Storage(_) => "storage",
        }
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => LedgerError::NotFound(what),
            RepositoryError::Conflict(what) => LedgerError::PersistenceConflict(what),
            RepositoryError::Database(e) => LedgerError::Storage(e.to_string()),
        }
    }
}

impl From<crate::validation::ValidationError> for LedgerError {
    fn from(err: crate::validation::ValidationError) -> Self {
        LedgerError::InvalidInput(err.to_string())
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": status.as_u16(),
            "outcome": "nothing_changed",
        });

        if let LedgerError::OutOfWindow { previous_year, .. } = &self {
            body["requires_late_calculation"] = json!(true);
            body["previous_year"] = json!(previous_year);
        }

        (status, Json(body)).into_response()
    }
}
