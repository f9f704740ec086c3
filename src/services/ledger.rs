//! The entry-application primitive shared by every engine, plus the retry
//! loop that wraps one unit of work.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::future::Future;

use crate::domain::{Account, Transaction, TransactionKind};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::LedgerUnit;

/// Attempts per unit of work before a conflict is surfaced to the caller.
pub const MAX_ATTEMPTS: u32 = 3;

/// Posts one entry against a locked account and stages the new balance and
/// the entry together in `unit`. Nothing is durable until the unit commits.
pub(crate) async fn apply_entry(
    unit: &mut dyn LedgerUnit,
    account: &mut Account,
    kind: TransactionKind,
    amount: &BigDecimal,
    staff_id: &str,
    at: DateTime<Utc>,
) -> LedgerResult<Transaction> {
    let entry = account.post(kind, amount, staff_id, at)?;
    unit.save_entry(account, &entry).await?;
    Ok(entry)
}

/// Runs `attempt` until it succeeds, fails with anything other than a
/// conflict, or has conflicted `MAX_ATTEMPTS` times. Each attempt must open
/// its own unit so a retry starts from freshly read state.
pub(crate) async fn with_retry<T, F, Fut>(operation: &str, mut attempt: F) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(LedgerError::PersistenceConflict(reason)) if tries < MAX_ATTEMPTS => {
                tracing::warn!(
                    operation,
                    attempt = tries,
                    reason = %reason,
                    "Conflicting write, retrying"
                );
            }
            Err(LedgerError::PersistenceConflict(reason)) => {
                tracing::error!(operation, attempts = tries, "Giving up after repeated conflicts");
                return Err(LedgerError::PersistenceConflict(format!(
                    "{} (gave up after {} attempts)",
                    reason, tries
                )));
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_conflicts_then_gives_up() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::PersistenceConflict("row locked".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::PersistenceConflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn succeeds_after_a_transient_conflict() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LedgerError::PersistenceConflict("serialization failure".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::NotFound("account".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
