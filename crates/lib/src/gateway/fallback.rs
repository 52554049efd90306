//! Generic fallback chain: run attempts in order, stop at the first success.
//!
//! Attempts are strictly sequential; each failure decides whether the next one runs.
//! There is no backoff and no retry of the same attempt.

use crate::upstream::TransportError;
use futures_util::future::BoxFuture;

/// One labelled attempt. The closure is only invoked if every earlier attempt failed.
pub struct Attempt<'a, T> {
    label: String,
    run: Box<dyn FnOnce() -> BoxFuture<'a, Result<T, TransportError>> + Send + 'a>,
}

impl<'a, T> Attempt<'a, T> {
    pub fn new<F>(label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Result<T, TransportError>> + Send + 'a,
    {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }
}

/// Every attempt failed (or there were none).
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("no attempts configured")]
    Empty,
    #[error("all {attempts} attempts failed; last ({label}): {source}")]
    Exhausted {
        attempts: usize,
        label: String,
        #[source]
        source: TransportError,
    },
}

/// Run `attempts` in order and return the first success. On exhaustion the last error is kept as the source.
pub async fn first_success<T>(attempts: Vec<Attempt<'_, T>>) -> Result<T, ChainError> {
    let total = attempts.len();
    let mut last: Option<(String, TransportError)> = None;
    for (i, attempt) in attempts.into_iter().enumerate() {
        let Attempt { label, run } = attempt;
        match run().await {
            Ok(value) => {
                if i > 0 {
                    log::info!("fallback: {} succeeded after {} failed attempt(s)", label, i);
                }
                return Ok(value);
            }
            Err(e) => {
                log::warn!("fallback: attempt {}/{} ({}) failed: {}", i + 1, total, label, e);
                last = Some((label, e));
            }
        }
    }
    match last {
        Some((label, source)) => Err(ChainError::Exhausted {
            attempts: total,
            label,
            source,
        }),
        None => Err(ChainError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::Mutex;

    fn failing(status: u16) -> TransportError {
        TransportError::Status {
            status,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let ran = Mutex::new(Vec::new());
        let ran_ref = &ran;
        let attempts = vec![
            Attempt::new("a", move || {
                async move {
                    ran_ref.lock().unwrap().push("a");
                    Err(failing(500))
                }
                .boxed()
            }),
            Attempt::new("b", move || {
                async move {
                    ran_ref.lock().unwrap().push("b");
                    Ok(2)
                }
                .boxed()
            }),
            Attempt::new("c", move || {
                async move {
                    ran_ref.lock().unwrap().push("c");
                    Ok(3)
                }
                .boxed()
            }),
        ];
        assert_eq!(first_success(attempts).await.unwrap(), 2);
        assert_eq!(*ran.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn exhaustion_keeps_last_error() {
        let attempts: Vec<Attempt<'_, ()>> = vec![
            Attempt::new("a", || async { Err(failing(500)) }.boxed()),
            Attempt::new("b", || async { Err(failing(404)) }.boxed()),
        ];
        match first_success(attempts).await {
            Err(ChainError::Exhausted {
                attempts,
                label,
                source: TransportError::Status { status, .. },
            }) => {
                assert_eq!(attempts, 2);
                assert_eq!(label, "b");
                assert_eq!(status, 404);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn empty_chain_fails() {
        let attempts: Vec<Attempt<'_, ()>> = Vec::new();
        assert!(matches!(first_success(attempts).await, Err(ChainError::Empty)));
    }
}
