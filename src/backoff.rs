//! Exponential-backoff retry wrapper for async operations.

use rand::Rng;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy. Field names match the `[backoff]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffOptions {
    /// Delay before every attempt, including the first.
    pub sleep_between_attempts_ms: u64,
    /// Maximum retries after the first attempt. `None` retries forever.
    pub retries: Option<u32>,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            sleep_between_attempts_ms: 2000,
            retries: None,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl BackoffOptions {
    /// Delay after the failure of retry number `attempt` (0-based).
    /// `jitter_factor` is ignored unless jitter is enabled.
    pub fn delay_for(&self, attempt: u32, jitter_factor: f64) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        let ms = if self.jitter {
            (exp as f64 * jitter_factor) as u64
        } else {
            exp
        };
        Duration::from_millis(ms)
    }
}

/// Run `op` until it succeeds or the retry budget is spent. Every error is
/// considered retryable.
pub async fn with_backoff<F, Fut, T, E>(op: F, options: &BackoffOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_backoff_if(op, options, |_: &E| true).await
}

/// Like [`with_backoff`], but errors for which `retryable` returns false
/// propagate immediately.
pub async fn with_backoff_if<F, Fut, T, E, P>(
    mut op: F,
    options: &BackoffOptions,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(options.sleep_between_attempts_ms)).await;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let exhausted = options.retries.is_some_and(|max| attempt >= max);
        if exhausted || !retryable(&err) {
            return Err(err);
        }

        let factor = if options.jitter {
            rand::thread_rng().gen_range(0.5..1.5)
        } else {
            1.0
        };
        let delay = options.delay_for(attempt, factor);
        warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying after failure");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(retries: Option<u32>) -> BackoffOptions {
        BackoffOptions {
            sleep_between_attempts_ms: 0,
            retries,
            base_delay_ms: 10,
            max_delay_ms: 10,
            jitter: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_op_runs_retries_plus_one_times() {
        let calls = Cell::new(0);
        let result: Result<(), String> = with_backoff(
            || {
                calls.set(calls.get() + 1);
                async { Err("boom".to_string()) }
            },
            &fast(Some(3)),
        )
        .await;

        assert_eq!(calls.get(), 4);
        assert_eq!(result, Err("boom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<&str, String> = with_backoff(
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n <= 2 {
                        Err(format!("fail {n}"))
                    } else {
                        Ok("done")
                    }
                }
            },
            &fast(Some(2)),
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn one_retry_gives_up_on_second_failure() {
        let calls = Cell::new(0);
        let result: Result<(), String> = with_backoff(
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(format!("fail {n}")) }
            },
            &fast(Some(1)),
        )
        .await;

        assert_eq!(calls.get(), 2);
        assert_eq!(result, Err("fail 2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_propagates_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), String> = with_backoff_if(
            || {
                calls.set(calls.get() + 1);
                async { Err("unauthorized".to_string()) }
            },
            &fast(None),
            |e| e != "unauthorized",
        )
        .await;

        assert_eq!(calls.get(), 1);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_before_first_attempt() {
        let options = BackoffOptions {
            sleep_between_attempts_ms: 500,
            ..fast(Some(0))
        };
        let start = tokio::time::Instant::now();
        let result: Result<u8, String> = with_backoff(|| async { Ok(7) }, &options).await;

        assert_eq!(result, Ok(7));
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn delay_doubles_up_to_cap() {
        let options = BackoffOptions {
            jitter: false,
            ..BackoffOptions::default()
        };
        assert_eq!(options.delay_for(0, 1.0), Duration::from_millis(2000));
        assert_eq!(options.delay_for(1, 1.0), Duration::from_millis(4000));
        assert_eq!(options.delay_for(3, 1.0), Duration::from_millis(16_000));
        assert_eq!(options.delay_for(4, 1.0), Duration::from_millis(30_000));
        assert_eq!(options.delay_for(40, 1.0), Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_scales_the_delay() {
        let options = BackoffOptions::default();
        assert_eq!(options.delay_for(0, 0.5), Duration::from_millis(1000));
        assert_eq!(options.delay_for(0, 1.25), Duration::from_millis(2500));
    }
}
