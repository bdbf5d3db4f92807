//! Exponential backoff with jitter, layered above individual transport calls.
//! Every transport invocation has a configurable timeout; expiry
//! triggers retry with exponential backoff (base delay D, factor 2, max
//! retries N, jitter up to 1×D).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use rclonepool_core::PoolError;

/// Policy for the retry wrapper. `base_delay` is D; each attempt doubles
/// the previous delay and adds up to one more D of jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_secs: f64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs_f64(base_delay_secs.max(0.0)),
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let backoff = self.base_delay.saturating_mul(factor);
        let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..1.0);
        backoff + self.base_delay.mul_f64(jitter_frac)
    }
}

/// Runs `op` up to `policy.max_retries + 1` times, sleeping with
/// exponential backoff and jitter between attempts. Only the last error
/// escapes.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, mut op: F) -> Result<T, PoolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PoolError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_retries && is_retryable(&e) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(attempt, ?delay, error = %e, "transport call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_retryable(err: &PoolError) -> bool {
    matches!(
        err,
        PoolError::Transport { .. } | PoolError::TransportTimeout { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let policy = RetryPolicy::new(3, 0.001);
        let calls = AtomicU32::new(0);
        let result: Result<u32, PoolError> = with_retry(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let policy = RetryPolicy::new(3, 0.001);
        let calls = AtomicU32::new(0);
        let result: Result<u32, PoolError> = with_retry(policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PoolError::Transport {
                        remote: "r2:".into(),
                        detail: "flaky".into(),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, 0.001);
        let calls = AtomicU32::new(0);
        let result: Result<u32, PoolError> = with_retry(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(PoolError::Transport {
                    remote: "r2:".into(),
                    detail: "always fails".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        let policy = RetryPolicy::new(5, 0.001);
        let calls = AtomicU32::new(0);
        let result: Result<u32, PoolError> = with_retry(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PoolError::NoEligibleRemote { chunk_size: 100 }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
