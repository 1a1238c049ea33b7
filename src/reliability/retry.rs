//! Resilient-call wrapper (§4.D): retries transient failures with
//! exponentially increasing, jittered sleeps. Grounded on the
//! `with_retry` generic retry loop, generalized over any error type whose
//! caller supplies a per-service transient predicate.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            jitter_ratio: 0.2,
        }
    }
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let raw = config.base_delay.as_secs_f64() * config.backoff_factor.powi(attempt as i32 - 1);
    let capped = raw.min(config.max_delay.as_secs_f64());
    let jitter_span = capped * config.jitter_ratio;
    let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
    Duration::from_secs_f64((capped + jitter).max(0.0))
}

/// Retries `operation` while `is_transient` returns true for its error,
/// up to `config.max_attempts`. Non-transient errors propagate immediately
/// (§4.D: "Non-transient exceptions propagate immediately").
pub async fn with_retry<T, E, F, Fut>(
    service: &str,
    config: &RetryConfig,
    is_transient: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_attempts && is_transient(&err) => {
                let delay = backoff_delay(config, attempt);
                warn!(service, attempt, delay_ms = delay.as_millis() as u64, "transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        };
        let result: Result<u32, &str> = with_retry("test", &config, |e| *e == "transient", || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("transient")
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_error_propagates_immediately() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::default();
        let result: Result<u32, &str> = with_retry("test", &config, |e| *e == "transient", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("fatal")
        })
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
