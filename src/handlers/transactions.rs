use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Transaction, TransactionKind};
use crate::error::LedgerError;
use crate::handlers::extract::{JsonBody, PathParam, deserialize_decimal};
use crate::handlers::StaffId;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TransactBody {
    pub kind: String,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub amount: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct TransactResponse {
    pub balance: BigDecimal,
    pub transaction: Transaction,
}

pub async fn transact(
    State(state): State<AppState>,
    StaffId(staff_id): StaffId,
    PathParam(number): PathParam<String>,
    JsonBody(body): JsonBody<TransactBody>,
) -> Result<impl IntoResponse, LedgerError> {
    let kind = body.kind.parse::<TransactionKind>()?;

    let (account, transaction) = state
        .transactions
        .transact(&number, &body.amount, kind, &staff_id)
        .await?;

    Ok(Json(TransactResponse {
        balance: account.balance().clone(),
        transaction,
    }))
}
