//! Exponential backoff around fallible async operations
//!
//! The policy makes up to `max_attempts` attempts. Between attempt `i` and
//! `i + 1` it sleeps `initial_delay * multiplier^(i - 1)`. A failure the
//! classifier rejects as non-transient is returned immediately. When every
//! attempt fails transiently the caller gets a single
//! [`AutocodeError::RetryExhausted`].

use async_trait::async_trait;
use autocode_core::config::RetryConfig;
use autocode_core::{AutocodeError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Blocks between attempts. Swappable so delays can be observed in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Backoff retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    /// Create a policy. A budget of zero is treated as a single attempt.
    ///
    /// The multiplier must be finite and at least 1.0.
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Result<Self> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(AutocodeError::Configuration(format!(
                "retry multiplier must be a finite number >= 1.0, got {}",
                multiplier
            )));
        }
        Ok(Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier,
        })
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self> {
        Self::new(config.max_attempts, config.initial_delay(), config.multiplier)
    }

    /// Single attempt, no sleeping
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the given 1-indexed failed attempt
    ///
    /// Saturates at [`Duration::MAX`] once the geometric growth no longer fits.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Run `op` under this policy using the tokio timer and the default
    /// transient classification
    pub async fn retry<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry_with(operation, &TokioSleeper, AutocodeError::is_transient, op)
            .await
    }

    /// Run `op` under this policy with an explicit sleeper and classifier
    pub async fn retry_with<T, F, Fut, C>(
        &self,
        operation: &str,
        sleeper: &dyn Sleeper,
        is_transient: C,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&AutocodeError) -> bool,
    {
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_transient(&err) {
                return Err(err);
            }

            if attempt >= self.max_attempts {
                error!(
                    operation,
                    attempts = self.max_attempts,
                    "All retries failed: {}",
                    err
                );
                return Err(AutocodeError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: self.max_attempts,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_after(attempt);
            warn!(
                operation,
                remaining = self.max_attempts - attempt,
                delay_ms = delay.as_millis() as u64,
                "Retryable error: {}",
                err
            );
            sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay(),
            multiplier: config.multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn transient() -> AutocodeError {
        AutocodeError::Service {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_exhausts_budget_with_geometric_delays() {
        for (attempts, initial_ms, multiplier) in [(3, 100, 2.0), (4, 50, 3.0), (1, 10, 2.0)] {
            let policy =
                RetryPolicy::new(attempts, Duration::from_millis(initial_ms), multiplier).unwrap();
            let sleeper = RecordingSleeper::default();
            let calls = AtomicU32::new(0);

            let result: Result<()> = policy
                .retry_with("flaky", &sleeper, AutocodeError::is_transient, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(transient()) }
                })
                .await;

            assert_eq!(calls.load(Ordering::SeqCst), attempts);
            match result.unwrap_err() {
                AutocodeError::RetryExhausted {
                    operation,
                    attempts: reported,
                    last,
                } => {
                    assert_eq!(operation, "flaky");
                    assert_eq!(reported, attempts);
                    assert!(last.is_transient());
                }
                other => panic!("unexpected error: {other}"),
            }

            let expected: Vec<Duration> = (0..attempts - 1)
                .map(|i| Duration::from_millis(initial_ms).mul_f64(multiplier.powi(i as i32)))
                .collect();
            assert_eq!(sleeper.delays(), expected);
        }
    }

    #[tokio::test]
    async fn test_non_transient_propagates_without_sleep() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), 2.0).unwrap();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .retry_with("bad_input", &sleeper, AutocodeError::is_transient, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AutocodeError::InvalidInput("empty prompt".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(AutocodeError::InvalidInput(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0).unwrap();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = policy
            .retry_with("eventually", &sleeper, AutocodeError::is_transient, || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(AutocodeError::Transport("connection reset".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), 2.0).unwrap();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        // Treat malformed responses as retryable for this caller only
        let result: Result<()> = policy
            .retry_with(
                "custom",
                &sleeper,
                |e| matches!(e, AutocodeError::MalformedResponse(_)),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(AutocodeError::MalformedResponse("no choices".to_string())) }
                },
            )
            .await;

        assert!(matches!(result, Err(AutocodeError::RetryExhausted { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_budget_means_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO, 2.0).unwrap();
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_delay_after() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_large_budget_saturates_delay() {
        let policy = RetryPolicy::new(80, Duration::from_secs(2), 2.0).unwrap();
        let sleeper = RecordingSleeper::default();

        let result: Result<()> = policy
            .retry_with("long", &sleeper, AutocodeError::is_transient, || async {
                Err(AutocodeError::Transport("connection refused".to_string()))
            })
            .await;

        assert!(matches!(
            result,
            Err(AutocodeError::RetryExhausted { attempts: 80, .. })
        ));
        let delays = sleeper.delays();
        assert_eq!(delays.len(), 79);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), Duration::MAX);
        assert_eq!(policy.delay_after(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_rejects_bad_multiplier() {
        for multiplier in [-1.0, 0.5, f64::NAN, f64::INFINITY] {
            let result = RetryPolicy::new(3, Duration::from_secs(1), multiplier);
            assert!(
                matches!(result, Err(AutocodeError::Configuration(_))),
                "multiplier {multiplier} should be rejected"
            );
        }

        let config = RetryConfig {
            multiplier: -2.0,
            ..RetryConfig::default()
        };
        assert!(RetryPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_zero_initial_delay_never_sleeps() {
        let policy = RetryPolicy::new(100, Duration::ZERO, 10.0).unwrap();
        assert_eq!(policy.delay_after(99), Duration::ZERO);
    }
}
