use std::future::Future;

use site_logging::site_warn;

use crate::config::RetryPolicy;
use crate::FetchError;

/// Runs `op` until it succeeds, fails permanently, or the attempt budget is
/// spent. Only [`FetchError::is_transient`] failures are retried.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                site_warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt,
                    attempts,
                    err,
                    policy.delay()
                );
                if !policy.delay().is_zero() {
                    tokio::time::sleep(policy.delay()).await;
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
