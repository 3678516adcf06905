//! Bounded retry for rate-limited backend calls
//!
//! Every backend call the engine makes goes through a [`RetryPolicy`]. A call
//! that fails with the backend's rate-limit signal is retried after a fixed
//! delay, up to `max_attempts` attempts in total; any other error is returned
//! at once. The wait goes through a [`Sleeper`] so tests can count waits
//! instead of spending wall-clock time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Suspends the current task between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval, bounded retry policy
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Policy waiting on the tokio timer
    ///
    /// A `max_attempts` of 0 is treated as 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Policy configured from the engine settings
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.retry_delay_secs),
        )
    }

    /// Replace the sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Maximum number of attempts per call
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait between attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// exhausts the attempt budget
    ///
    /// # Parameters
    ///
    /// - `what`: short description of the call, for logs
    /// - `is_rate_limited`: recognises the backend's rate-limit signal
    /// - `op`: produces one attempt per call
    ///
    /// # Errors
    ///
    /// The first non-rate-limit error, or the last rate-limit error once
    /// `max_attempts` attempts have failed.
    pub async fn run<T, F, Fut, P>(&self, what: &str, is_rate_limited: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        P: Fn(&Error) -> bool + Send + Sync,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", what, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if is_rate_limited(&e) && attempt < self.max_attempts => {
                    warn!(
                        "{} rate limited (attempt {}/{}), retrying in {:?}",
                        what, attempt, self.max_attempts, self.delay
                    );
                    self.sleeper.sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if is_rate_limited(&e) {
                        warn!("{} still rate limited after {} attempts", what, attempt);
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingSleeper {
        waits: AtomicU32,
    }

    #[async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.waits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn policy(max_attempts: u32) -> (RetryPolicy, Arc<CountingSleeper>) {
        let sleeper = Arc::new(CountingSleeper::default());
        let policy = RetryPolicy::new(max_attempts, Duration::from_secs(5))
            .with_sleeper(sleeper.clone());
        (policy, sleeper)
    }

    #[test]
    fn succeeds_after_transient_rate_limits() {
        let (policy, sleeper) = policy(3);
        let calls = AtomicU32::new(0);

        let result = tokio_test::block_on(policy.run("fetch", Error::is_rate_limited, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::rate_limited("slow down"))
                } else {
                    Ok(n)
                }
            }
        }));

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.waits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn gives_up_with_last_error() {
        let (policy, sleeper) = policy(3);
        let calls = AtomicU32::new(0);

        let result: Result<()> =
            tokio_test::block_on(policy.run("apply", Error::is_rate_limited, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(Error::rate_limited(format!("attempt {n}"))) }
            }));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("attempt 2"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.waits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let (policy, sleeper) = policy(5);
        let calls = AtomicU32::new(0);

        let result: Result<()> =
            tokio_test::block_on(policy.run("apply", Error::is_rate_limited, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::auth("bad key")) }
            }));

        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.waits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
