use bigdecimal::BigDecimal;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use teller_ledger::adapters::{InMemoryLedgerStore, InMemoryRateStore};
use teller_ledger::clock::FixedClock;
use teller_ledger::domain::transaction::fold_balance;
use teller_ledger::domain::{AccountType, AccrualPolicy, HolderInfo, TransactionKind};
use teller_ledger::error::LedgerError;
use teller_ledger::services::OpenAccountRequest;
use teller_ledger::AppState;

fn state() -> AppState {
    AppState::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(InMemoryRateStore::new()),
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 8, 8, 8, 0, 0).unwrap(),
        )),
        AccrualPolicy::default(),
        "101".to_string(),
    )
}

async fn open(state: &AppState, deposit: i64) -> String {
    let (account, _) = state
        .accounts
        .open_account(OpenAccountRequest {
            account_type: AccountType::Savings,
            holder: HolderInfo {
                name_prefix: "Ms.".to_string(),
                first_name: "Nok".to_string(),
                last_name: "Kaewmanee".to_string(),
                account_name: None,
                national_id: "1349900765432".to_string(),
            },
            initial_deposit: BigDecimal::from(deposit),
            staff_id: "teller-4".to_string(),
        })
        .await
        .unwrap();
    account.number.to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_cannot_overdraw() {
    let state = state();
    let number = open(&state, 100).await;

    let first = {
        let engine = state.transactions.clone();
        let number = number.clone();
        tokio::spawn(async move {
            engine
                .transact(&number, &BigDecimal::from(60), TransactionKind::Withdraw, "teller-4")
                .await
        })
    };
    let second = {
        let engine = state.transactions.clone();
        let number = number.clone();
        tokio::spawn(async move {
            engine
                .transact(&number, &BigDecimal::from(60), TransactionKind::Withdraw, "teller-5")
                .await
        })
    };

    let results = vec![first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let refusals = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(refusals, 1);

    let (account, history) = state.accounts.list_transactions(&number).await.unwrap();
    assert_eq!(account.balance(), &BigDecimal::from(40));
    assert_eq!(history.len(), 2);
    assert_eq!(fold_balance(&history), *account.balance());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_deposits_are_all_applied() {
    let state = state();
    let number = open(&state, 1).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = state.transactions.clone();
        let number = number.clone();
        handles.push(tokio::spawn(async move {
            engine
                .transact(
                    &number,
                    &BigDecimal::from(i + 1),
                    TransactionKind::Deposit,
                    "teller-4",
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let (account, history) = state.accounts.list_transactions(&number).await.unwrap();
    // 1 + (1 + 2 + ... + 20)
    assert_eq!(account.balance(), &BigDecimal::from(211));
    assert_eq!(history.len(), 21);
    assert_eq!(fold_balance(&history), *account.balance());
    let seqs: Vec<i64> = history.iter().map(|t| t.seq).collect();
    assert_eq!(seqs, (1..=21).collect::<Vec<i64>>());
}
