//! Wall-clock bound for async operations.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The operation did not finish within its limit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation timed out after {}ms", .0.as_millis())]
pub struct TimeoutError(pub Duration);

/// Aborts a future that runs longer than a fixed limit.
///
/// The inner future is dropped on expiry, which cancels whatever it was
/// doing at its current await point.
#[derive(Debug, Clone, Copy)]
pub struct TimeLimiter {
    limit: Duration,
}

impl TimeLimiter {
    /// Create a limiter.
    #[must_use]
    pub const fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// Configured limit.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Run `future` under the limit.
    ///
    /// # Errors
    ///
    /// Returns [`TimeoutError`] if the limit elapses first.
    pub async fn call<F>(&self, future: F) -> Result<F::Output, TimeoutError>
    where
        F: Future,
    {
        tokio::time::timeout(self.limit, future).await.map_err(|_| {
            tracing::warn!(limit_ms = self.limit.as_millis(), "Time limit exceeded");
            TimeoutError(self.limit)
        })
    }
}
