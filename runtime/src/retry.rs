//! Bounded re-attempts with exponential backoff.
//!
//! Two callers in the pipeline re-attempt work: the provider client retries
//! transient HTTP failures, and the sync service retries a plan's whole
//! reconcile after an optimistic-lock conflict. Both describe how hard to try
//! with a [`RetryPolicy`] and decide *what* is worth retrying with a predicate
//! passed to [`retry_with_predicate`].
//!
//! # Example
//!
//! ```rust
//! use plansync_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! let stored = retry_with_predicate(
//!     policy,
//!     || async { Ok::<_, String>("P1") },
//!     |err: &String| err.starts_with("conflict"),
//! )
//! .await?;
//! assert_eq!(stored, "P1");
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use std::future::Future;
use std::time::Duration;

/// How many times to try and how long to wait in between.
///
/// `max_attempts` counts the first call, so the default of 3 means one call
/// and at most two retries, waiting 100ms and then 200ms.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first call included. Never below 1.
    pub max_attempts: usize,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Start from the defaults.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Number of retries after the first attempt.
    #[must_use]
    pub const fn retries(&self) -> usize {
        self.max_attempts.saturating_sub(1)
    }

    /// The waits this policy inserts between attempts, in order.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            remaining: self.retries(),
            max_delay: self.max_delay,
            multiplier: self.multiplier.max(1.0),
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Total attempts. Values below 1 become 1.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    /// Wait before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Upper bound for any single wait.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Growth factor between waits. Values below 1.0 are treated as 1.0.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Finish the policy.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.policy.max_attempts.max(1),
            ..self.policy
        }
    }
}

/// Iterator over the waits of a [`RetryPolicy`].
///
/// Yields one delay per retry; each is the previous one times the multiplier,
/// capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    remaining: usize,
    max_delay: Duration,
    multiplier: f64,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next;
        self.next = Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .map_or(self.max_delay, |grown| grown.min(self.max_delay));
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Backoff {}

/// Run `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the policy runs out of attempts.
///
/// Each attempt calls `operation` afresh, so state it reads (a stored plan,
/// an HTTP response) is re-read on every try.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once attempts
/// are exhausted.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut waits = policy.backoff();
    let mut attempt = 1_usize;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            tracing::debug!(attempt, error = %err, "Not retryable");
            return Err(err);
        }

        let Some(wait) = waits.next() else {
            tracing::error!(attempts = attempt, error = %err, "Retries exhausted");
            RetryMetrics::record_exhausted();
            return Err(err);
        };

        tracing::warn!(
            attempt,
            max_attempts = policy.max_attempts,
            wait_ms = wait.as_millis(),
            error = %err,
            "Attempt failed, retrying"
        );
        RetryMetrics::record_attempt();
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
