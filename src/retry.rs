//! Backoff for the boundary collection fetch.

use anyhow::{anyhow, Result};
use rand::Rng;
use std::fmt;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 250,
            max_delay_ms: 5000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = (self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32)).min(self.max_delay_ms as f64);
        let spread = capped * self.jitter_factor;
        let jitter = if spread > 0.0 { rand::thread_rng().gen_range(-spread..=spread) } else { 0.0 };
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// A failure another attempt cannot fix (404, malformed URL). Returned
/// through `anyhow` so `retry_async` can stop early.
#[derive(Debug)]
pub struct Permanent(pub String);

impl fmt::Display for Permanent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Permanent {}

pub fn is_permanent(err: &anyhow::Error) -> bool {
    err.is::<Permanent>()
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_async<F, Fut, T>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_permanent(&e) => return Err(e),
            Err(e) => {
                if attempt < config.max_retries {
                    let delay = config.delay_for_attempt(attempt);
                    log(
                        Level::Warn,
                        Domain::Boundary,
                        "retry",
                        obj(&[
                            ("operation", v_str(operation_name)),
                            ("attempt", serde_json::json!(attempt + 1)),
                            ("of", serde_json::json!(config.max_retries + 1)),
                            ("error", v_str(&e.to_string())),
                            ("delay_ms", serde_json::json!(delay.as_millis() as u64)),
                        ]),
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("{}: no attempts made", operation_name)))
}

pub fn is_retryable_http_status(status: u16) -> bool {
    matches!(status,
        408 |   // Request Timeout
        429 |   // Too Many Requests
        500 |   // Internal Server Error
        502 |   // Bad Gateway
        503 |   // Service Unavailable
        504     // Gateway Timeout
    )
}

pub fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig { max_retries, base_delay_ms: 1, max_delay_ms: 10, jitter_factor: 0.0 }
    }

    #[test]
    fn delay_doubles_then_caps() {
        let config = RetryConfig { max_retries: 3, base_delay_ms: 100, max_delay_ms: 1000, jitter_factor: 0.0 };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_http_status(503));
        assert!(is_retryable_http_status(429));
        assert!(!is_retryable_http_status(404));
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<i32> = retry_async(&fast(3), "test", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("not yet"))
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
    async fn permanent_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<i32> = retry_async(&fast(5), "test", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(Permanent("404 Not Found".to_string()).into())
            }
        })
        .await;
        assert!(is_permanent(&result.unwrap_err()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_with_last_error() {
        let result: Result<i32> = retry_async(&fast(1), "test", || async { Err(anyhow!("down")) }).await;
        assert_eq!(result.unwrap_err().to_string(), "down");
    }
}
