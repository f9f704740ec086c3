use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::domain::AccountType;
use crate::error::LedgerError;
use crate::handlers::extract::{JsonBody, QueryParams, deserialize_decimal};
use crate::handlers::StaffId;
use crate::services::AccrualRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AccrueBody {
    pub account_type: String,
    #[serde(default)]
    pub late_calculation: bool,
    pub target_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewBody {
    pub period_identifier: String,
}

/// Execution needs the caller to repeat the rate it was shown, and to say
/// so explicitly.
#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    pub period_identifier: String,
    #[serde(default)]
    pub confirm: bool,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub expected_rate: BigDecimal,
}

pub async fn accrue(
    State(state): State<AppState>,
    StaffId(staff_id): StaffId,
    JsonBody(body): JsonBody<AccrueBody>,
) -> Result<impl IntoResponse, LedgerError> {
    let account_type = body.account_type.parse::<AccountType>()?;

    let outcome = state
        .accrual
        .accrue(AccrualRequest {
            account_type,
            late_calculation: body.late_calculation,
            target_year: body.target_year,
            staff_id,
        })
        .await?;

    Ok(Json(outcome))
}

pub async fn list_accrual_logs(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<LogQuery>,
) -> Result<impl IntoResponse, LedgerError> {
    let logs = state.accrual.list_logs(query.limit).await?;
    Ok(Json(logs))
}

pub async fn preview_correction(
    State(state): State<AppState>,
    StaffId(_staff_id): StaffId,
    JsonBody(body): JsonBody<PreviewBody>,
) -> Result<impl IntoResponse, LedgerError> {
    let preview = state.corrections.preview(&body.period_identifier).await?;
    Ok(Json(preview))
}

pub async fn execute_correction(
    State(state): State<AppState>,
    StaffId(staff_id): StaffId,
    JsonBody(body): JsonBody<ExecuteBody>,
) -> Result<impl IntoResponse, LedgerError> {
    if !body.confirm {
        return Err(LedgerError::InvalidInput(
            "correction rewrites posted interest and must be confirmed".to_string(),
        ));
    }

    let preview = state.corrections.preview(&body.period_identifier).await?;
    if preview.target_rate != body.expected_rate {
        return Err(LedgerError::PersistenceConflict(format!(
            "current rate is {}, preview was approved at {}",
            preview.target_rate, body.expected_rate
        )));
    }

    let approved = state.corrections.approve(preview, &staff_id)?;
    let outcome = state.corrections.execute(&approved).await?;

    Ok(Json(outcome))
}
