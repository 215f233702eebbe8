//! Bounded retry with optional exponential backoff.

use std::thread;
use std::time::Duration;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; zero disables waiting
    pub base_delay: Duration,
    /// Multiplier applied per further attempt
    pub backoff_factor: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Notified before each retry.
pub trait RetryCallback {
    /// `attempt` is the 1-indexed attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &anyhow::Error, delay: Duration);
}

/// Logs each retry at warn level.
pub struct LogCallback<'a> {
    pub label: &'a str,
}

impl RetryCallback for LogCallback<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &anyhow::Error, delay: Duration) {
        log::warn!(
            "{} attempt {attempt}/{max_attempts} failed: {error:#}; retrying in {:?}",
            self.label,
            delay
        );
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// Gives up at once on an error `is_transient` rejects. The last error is
/// returned when all attempts fail.
pub fn with_retry<T, F, P>(
    policy: &RetryPolicy,
    callback: Option<&dyn RetryCallback>,
    is_transient: P,
    mut operation: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> anyhow::Result<T>,
    P: Fn(&anyhow::Error) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts || !is_transient(&e) {
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempt - 1);
                if let Some(cb) = callback {
                    cb.on_retry(attempt, max_attempts, &e, delay);
                }
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
}
