use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Account, AccountType, HolderInfo, Transaction};
use crate::error::LedgerError;
use crate::handlers::extract::{JsonBody, PathParam, deserialize_decimal};
use crate::handlers::StaffId;
use crate::services::OpenAccountRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenAccountBody {
    pub account_type: String,
    #[serde(default)]
    pub name_prefix: String,
    pub first_name: String,
    pub last_name: String,
    pub account_name: Option<String>,
    pub national_id: String,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub initial_deposit: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct OpenedAccount {
    pub account: Account,
    pub transaction: Transaction,
}

#[derive(Debug, Serialize)]
pub struct AccountHistory {
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

pub async fn open_account(
    State(state): State<AppState>,
    StaffId(staff_id): StaffId,
    JsonBody(body): JsonBody<OpenAccountBody>,
) -> Result<impl IntoResponse, LedgerError> {
    let account_type = body.account_type.parse::<AccountType>()?;

    let (account, transaction) = state
        .accounts
        .open_account(OpenAccountRequest {
            account_type,
            holder: HolderInfo {
                name_prefix: body.name_prefix,
                first_name: body.first_name,
                last_name: body.last_name,
                account_name: body.account_name,
                national_id: body.national_id,
            },
            initial_deposit: body.initial_deposit,
            staff_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OpenedAccount {
            account,
            transaction,
        }),
    ))
}

pub async fn get_account(
    State(state): State<AppState>,
    PathParam(number): PathParam<String>,
) -> Result<impl IntoResponse, LedgerError> {
    let account = state.accounts.get_account(&number).await?;
    Ok(Json(account))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    PathParam(number): PathParam<String>,
) -> Result<impl IntoResponse, LedgerError> {
    let (account, transactions) = state.accounts.list_transactions(&number).await?;
    Ok(Json(AccountHistory {
        account,
        transactions,
    }))
}
