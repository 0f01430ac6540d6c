//! Retry policies for connection-level failures.
//!
//! The client wraps every forwarded request in [`call_with_retry`]. Only
//! errors for which [`KeeperError::is_retryable`] holds are retried, and only
//! while the policy allows it. Every policy decision is counted through the
//! configured [`TracerDriver`].

use std::time::{Duration, Instant};

use crate::{
    error::KeeperError,
    tracer::{RETRIES_ALLOWED, RETRIES_DISALLOWED, TracerDriver},
};

/// Blocks the retrying thread between attempts.
pub trait RetrySleeper: Send + Sync {
    /// Sleep for `duration`.
    ///
    /// # Errors
    ///
    /// Implementations may abort the retry loop by returning an error.
    fn sleep_for(&self, duration: Duration) -> Result<(), KeeperError>;
}

/// Sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl RetrySleeper for ThreadSleeper {
    fn sleep_for(&self, duration: Duration) -> Result<(), KeeperError> {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
        Ok(())
    }
}

/// Decides whether a failed attempt is retried.
pub trait RetryPolicy: Send + Sync {
    /// Called after attempt number `retry_count` (0-based) failed with a
    /// retryable error. Returns true to retry; the policy sleeps through
    /// `sleeper` before returning.
    fn allow_retry(&self, retry_count: u32, elapsed: Duration, sleeper: &dyn RetrySleeper)
    -> bool;
}

/// Retry up to `n` times with a fixed pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryNTimes {
    n: u32,
    sleep_between: Duration,
}

impl RetryNTimes {
    /// Policy allowing `n` retries.
    pub fn new(n: u32, sleep_between: Duration) -> Self {
        Self { n, sleep_between }
    }
}

impl RetryPolicy for RetryNTimes {
    fn allow_retry(
        &self,
        retry_count: u32,
        _elapsed: Duration,
        sleeper: &dyn RetrySleeper,
    ) -> bool {
        if retry_count >= self.n {
            return false;
        }
        sleeper.sleep_for(self.sleep_between).is_ok()
    }
}

/// Retry exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOneTime(RetryNTimes);

impl RetryOneTime {
    /// Single retry after `sleep_between`.
    pub fn new(sleep_between: Duration) -> Self {
        Self(RetryNTimes::new(1, sleep_between))
    }
}

impl RetryPolicy for RetryOneTime {
    fn allow_retry(&self, retry_count: u32, elapsed: Duration, sleeper: &dyn RetrySleeper) -> bool {
        self.0.allow_retry(retry_count, elapsed, sleeper)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy gives up.
pub fn call_with_retry<T>(
    policy: &dyn RetryPolicy,
    sleeper: &dyn RetrySleeper,
    tracer: &dyn TracerDriver,
    mut op: impl FnMut() -> Result<T, KeeperError>,
) -> Result<T, KeeperError> {
    let started = Instant::now();
    let mut retry_count = 0;

    loop {
        match op() {
            Err(err) if err.is_retryable() => {
                if !policy.allow_retry(retry_count, started.elapsed(), sleeper) {
                    tracer.add_count(RETRIES_DISALLOWED, 1);
                    return Err(err);
                }
                tracer.add_count(RETRIES_ALLOWED, 1);
                retry_count += 1;
                tracing::debug!(retry_count, error = %err, "retrying request");
            },
            result => return result,
        }
    }
}
