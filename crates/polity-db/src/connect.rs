//! First-connection retry shared by both backends.

use std::future::Future;
use std::time::Duration;

use crate::error::DbError;

/// How many times to try and how long to wait before the first retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Backoff {
    /// Total attempts, at least one.
    pub(crate) attempts: u32,
    /// Delay after the first failure; doubled after each later one.
    pub(crate) initial: Duration,
}

/// Run `attempt` until it succeeds or `backoff.attempts` are spent.
///
/// Only the last error is returned.
pub(crate) async fn with_backoff<T, F, Fut>(
    backend: &'static str,
    backoff: Backoff,
    mut attempt: F,
) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let attempts = backoff.attempts.max(1);
    let mut delay = backoff.initial;
    let mut tried: u32 = 0;
    loop {
        tried = tried.saturating_add(1);
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if tried < attempts => {
                tracing::warn!(
                    backend,
                    attempt = tried,
                    attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(err) => {
                tracing::error!(backend, attempts, error = %err, "Giving up on connection");
                return Err(err.into());
            }
        }
    }
}
