use std::future::Future;
use std::time::Duration;

use bol_schemas::{LedgerError, LedgerResult};
use tracing::warn;

/// Map a store error onto the ledger taxonomy. Typed ledger errors raised
/// inside the store pass through; serialization failures and deadlocks
/// become `TransientConflict`; everything else is `Storage`.
pub fn classify(err: anyhow::Error) -> LedgerError {
    if bol_db::is_serialization_failure(&err) {
        return LedgerError::TransientConflict(format!("{err:#}"));
    }
    match err.downcast::<LedgerError>() {
        Ok(ledger) => ledger,
        Err(other) => LedgerError::Storage(other),
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(10u64 << attempt.min(6))
}

/// Run `op` until it succeeds, fails with a non-retryable error, or has been
/// retried `max_retries` times. Each attempt must open its own transaction.
pub async fn retry_on_conflict<T, F, Fut>(max_retries: u32, op_name: &str, mut op: F) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                warn!(op = op_name, attempt, max_retries, error = %e, "transient conflict, retrying");
                tokio::time::sleep(backoff(attempt)).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn typed_errors_survive_the_anyhow_round_trip() {
        let err: anyhow::Error = LedgerError::InvariantViolation("oversell".into()).into();
        assert!(matches!(classify(err), LedgerError::InvariantViolation(_)));

        let err: anyhow::Error = LedgerError::not_found("account", "a1").into();
        assert_eq!(classify(err).kind(), "NOT_FOUND");
    }

    #[test]
    fn untyped_errors_are_storage() {
        let err = anyhow::anyhow!("connection reset").context("lock_account failed");
        assert!(matches!(classify(err), LedgerError::Storage(_)));
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let out = retry_on_conflict(3, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LedgerError::TransientConflict("40001".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let err = retry_on_conflict(2, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(LedgerError::TransientConflict("40P01".into())) }
        })
        .await
        .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_on_conflict(5, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(LedgerError::DataInconsistency("no lots".into())) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "DATA_INCONSISTENCY");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
