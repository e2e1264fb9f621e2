//! Retry/backoff (C11). Centralizes the per-backend transient-error
//! classification and bounded retry described in §4.2, behind a single
//! `run_with_retry`, per the design note in §9 ("Centralize the retry
//! logic behind a single function `run_with_retry(op, classifier, budget)`;
//! pass a per-backend classifier"). Built on the `backoff` crate, already
//! part of the teacher's dependency stack for exactly this purpose.

use crate::backend::BackendKind;
use crate::config::RetryConfig;
use crate::error::SkcdError;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Is this `sqlx::Error` transient for the given backend, per §4.2's table?
///
/// Embedded: `SQLITE_BUSY` (5) and `SQLITE_LOCKED` (6) are transient.
/// Networked: a missing SQLState, or one starting with `08` (communication)
/// or `xx` (system), or an otherwise-unclassifiable state, is transient.
pub fn classify(backend: BackendKind, err: &sqlx::Error) -> bool {
    match backend {
        BackendKind::Embedded => match err {
            sqlx::Error::Database(db_err) => {
                matches!(db_err.code().as_deref(), Some("5") | Some("6"))
            }
            sqlx::Error::PoolTimedOut => true,
            _ => false,
        },
        BackendKind::Networked => match err {
            sqlx::Error::Database(db_err) => match db_err.code() {
                None => true,
                Some(code) => {
                    code.starts_with("08") || code.starts_with("xx") || code.starts_with("XX")
                }
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
            _ => false,
        },
    }
}

/// Run `op` to completion, retrying transient `sqlx::Error`s up to the
/// configured per-backend budget with a fixed backoff sleep (§4.2: "20
/// retries with 5-second sleeps" embedded, "3 retries with 5-second sleeps"
/// networked). Non-transient failures and exhausted retries are returned
/// immediately as a `TransientBusy`/`TransientComm` `SkcdError` or the
/// underlying engine error, never silently swallowed.
pub async fn run_with_retry<T, F, Fut>(
    backend: BackendKind,
    retry_cfg: &RetryConfig,
    mut op: F,
) -> Result<T, SkcdError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let (max_retries, backoff_secs) = match backend {
        BackendKind::Embedded => (
            retry_cfg.embedded_max_retries,
            retry_cfg.embedded_backoff_secs,
        ),
        BackendKind::Networked => (
            retry_cfg.networked_max_retries,
            retry_cfg.networked_backoff_secs,
        ),
    };

    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(backoff_secs))
        .with_max_interval(Duration::from_secs(backoff_secs))
        .with_multiplier(1.0)
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if classify(backend, &e) && attempt < max_retries => {
                attempt += 1;
                let wait = backoff.next_backoff().unwrap_or(Duration::from_secs(backoff_secs));
                warn!(attempt, ?wait, error = %e, "retrying transient engine error");
                tokio::time::sleep(wait).await;
                continue;
            }
            Err(e) if classify(backend, &e) => {
                return Err(match backend {
                    BackendKind::Embedded => SkcdError::TransientBusy(e.to_string()),
                    BackendKind::Networked => SkcdError::TransientComm(e.to_string()),
                });
            }
            Err(e) => return Err(SkcdError::Engine(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry_cfg = RetryConfig {
            embedded_max_retries: 3,
            embedded_backoff_secs: 0,
            ..RetryConfig::default()
        };
        let calls2 = calls.clone();
        let result: Result<u32, SkcdError> =
            run_with_retry(BackendKind::Embedded, &retry_cfg, move || {
                let calls = calls2.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(sqlx::Error::PoolTimedOut)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_transient_error() {
        let retry_cfg = RetryConfig {
            embedded_max_retries: 1,
            embedded_backoff_secs: 0,
            ..RetryConfig::default()
        };
        let result: Result<(), SkcdError> =
            run_with_retry(BackendKind::Embedded, &retry_cfg, || async {
                Err(sqlx::Error::PoolTimedOut)
            })
            .await;
        assert!(matches!(result, Err(SkcdError::TransientBusy(_))));
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let retry_cfg = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<(), SkcdError> =
            run_with_retry(BackendKind::Embedded, &retry_cfg, move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(sqlx::Error::RowNotFound)
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
