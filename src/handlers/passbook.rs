//! Print-status endpoints for the passbook printer. Amounts are never
//! touched here.

use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::handlers::accounts::AccountHistory;
use crate::handlers::extract::{JsonBody, PathParam};
use crate::handlers::StaffId;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MarkPrintedBody {
    pub transaction_ids: Vec<Uuid>,
    #[serde(default = "default_printed")]
    pub printed: bool,
}

fn default_printed() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct MarkPrintedResponse {
    pub updated_count: u64,
}

pub async fn list_unprinted(
    State(state): State<AppState>,
    PathParam(number): PathParam<String>,
) -> Result<impl IntoResponse, LedgerError> {
    let (account, transactions) = state.accounts.list_unprinted(&number).await?;
    Ok(Json(AccountHistory {
        account,
        transactions,
    }))
}

pub async fn mark_printed(
    State(state): State<AppState>,
    StaffId(_staff_id): StaffId,
    JsonBody(body): JsonBody<MarkPrintedBody>,
) -> Result<impl IntoResponse, LedgerError> {
    let updated_count = state
        .accounts
        .mark_printed(&body.transaction_ids, body.printed)
        .await?;

    Ok(Json(MarkPrintedResponse { updated_count }))
}
