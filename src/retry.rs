//! Retry policy building blocks
//!
//! Transient-failure classification, the pure backoff-duration function, and
//! the sleep abstraction the fetcher suspends on. Keeping the delay math
//! free of actual clocks lets the backoff schedule be tested without timers.

use crate::config::RetryConfig;
use crate::error::Error;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network blips, connection reset) should return
/// `true`. Permanent failures (missing message, bad configuration, local
/// I/O outside the transient kinds) should return `false`. Rate-limit
/// signals are handled separately and are deliberately not "retryable" in
/// this sense.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Rate limits have their own wait discipline in the fetcher
            Error::RateLimited { .. } => false,
            // Everything else is permanent from the retry loop's view
            _ => false,
        }
    }
}

/// Backoff delay before retry number `attempt` (0-based), without jitter.
///
/// `initial_delay * multiplier^attempt`, capped at `max_delay`. Pure so the
/// whole schedule can be asserted in tests.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = config.backoff_multiplier.powi(attempt.min(63) as i32);
    let delay = Duration::from_secs_f64(config.initial_delay.as_secs_f64() * factor);
    delay.min(config.max_delay)
}

/// Wait before the next attempt after `consecutive_hits` rate-limit signals.
///
/// The larger of the server-specified wait and a doubling backoff seeded at
/// `initial_delay`, capped at `max_rate_limit_wait`.
pub fn rate_limit_wait(
    config: &RetryConfig,
    server_wait: Option<Duration>,
    consecutive_hits: u32,
) -> Duration {
    let doubled = Duration::from_secs_f64(
        config.initial_delay.as_secs_f64() * 2f64.powi(consecutive_hits.min(63) as i32),
    );
    let wait = server_wait.unwrap_or(Duration::ZERO).max(doubled);
    wait.min(config.max_rate_limit_wait)
}

/// Add random jitter to a delay to avoid synchronized retries.
///
/// Uniform between 0% and 100% of the delay, so the result is between
/// `delay` and `2 * delay`.
pub fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

/// Suspension point used by the fetcher for backoff and rate-limit waits
///
/// Production code sleeps on the tokio timer; tests inject a recording
/// implementation so retry behavior is verified without real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
