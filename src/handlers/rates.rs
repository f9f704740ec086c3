use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::domain::AccountType;
use crate::error::LedgerError;
use crate::handlers::extract::{JsonBody, PathParam, deserialize_decimal};
use crate::handlers::StaffId;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetRateBody {
    #[serde(deserialize_with = "deserialize_decimal")]
    pub rate: BigDecimal,
}

pub async fn list_rates(State(state): State<AppState>) -> Result<impl IntoResponse, LedgerError> {
    let rates = state.rates.list_rates().await?;
    Ok(Json(rates))
}

pub async fn set_rate(
    State(state): State<AppState>,
    StaffId(staff_id): StaffId,
    PathParam(account_type): PathParam<String>,
    JsonBody(body): JsonBody<SetRateBody>,
) -> Result<impl IntoResponse, LedgerError> {
    let account_type = account_type.parse::<AccountType>()?;
    let rate = state.rates.set_rate(account_type, &body.rate).await?;
    tracing::info!(account_type = %account_type, staff_id = %staff_id, "Rate set via API");
    Ok(Json(rate))
}
