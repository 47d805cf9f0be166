//! Fixed-delay retry of transient remote failures.

use std::future::Future;
use std::time::Duration;

use crate::remote::RemoteError;

/// Delay between attempts of a transiently failing remote call.
///
/// The engine retries forever at this fixed pace; there is no backoff
/// and no attempt budget. Callers bound the overall lifetime by racing
/// the retry loop against a [`CancelScope`](crate::CancelScope).
pub const RETRY_DELAY: Duration = Duration::from_secs(15);

/// Run `op` until it succeeds or fails non-transiently.
///
/// A transient failure (see [`RemoteError::is_transient`]) sleeps for
/// `delay` and tries again, indefinitely. Any other failure propagates
/// on the first occurrence.
pub async fn retry_transient<T, F, Fut>(delay: Duration, mut op: F) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() => {
                tracing::debug!(
                    %error,
                    delay_secs = delay.as_secs(),
                    "transient remote failure, will retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
