pub mod adapters;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::AccrualPolicy;
use crate::ports::{LedgerStore, RateStore};
use crate::services::{
    AccountService, AccrualEngine, CorrectionEngine, RateRegistry, TransactionEngine,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub accounts: AccountService,
    pub transactions: TransactionEngine,
    pub rates: RateRegistry,
    pub accrual: AccrualEngine,
    pub corrections: CorrectionEngine,
}

impl AppState {
    /// Wires every engine onto the same stores and clock.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rate_store: Arc<dyn RateStore>,
        clock: Arc<dyn Clock>,
        policy: AccrualPolicy,
        issuer_prefix: String,
    ) -> Self {
        let rates = RateRegistry::new(rate_store, clock.clone());

        Self {
            accounts: AccountService::new(store.clone(), clock.clone(), issuer_prefix),
            transactions: TransactionEngine::new(store.clone(), clock.clone()),
            accrual: AccrualEngine::new(store.clone(), rates.clone(), clock.clone(), policy),
            corrections: CorrectionEngine::new(store.clone(), rates.clone(), clock),
            rates,
            store,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/accounts", post(handlers::accounts::open_account))
        .route("/accounts/:number", get(handlers::accounts::get_account))
        .route(
            "/accounts/:number/transactions",
            get(handlers::accounts::list_transactions).post(handlers::transactions::transact),
        )
        .route(
            "/accounts/:number/unprinted",
            get(handlers::passbook::list_unprinted),
        )
        .route("/transactions/printed", post(handlers::passbook::mark_printed))
        .route("/rates", get(handlers::rates::list_rates))
        .route("/rates/:account_type", put(handlers::rates::set_rate))
        .route(
            "/interest/accruals",
            get(handlers::interest::list_accrual_logs).post(handlers::interest::accrue),
        )
        .route(
            "/interest/corrections/preview",
            post(handlers::interest::preview_correction),
        )
        .route(
            "/interest/corrections/execute",
            post(handlers::interest::execute_correction),
        )
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
