//! Composition of the resilience policies around one fallible call.
//!
//! The layers are fixed, outermost first:
//!
//! 1. [`TimeLimiter`] bounds the total wall-clock cost, retries included.
//! 2. [`CircuitBreaker`] decides whether the call may happen at all and
//!    records one outcome for the whole retried sequence.
//! 3. [`retry_with_predicate`] re-attempts transient failures inside that
//!    single permitted call.
//!
//! # Example
//!
//! ```rust
//! use plansync_runtime::resilience::ResiliencePipeline;
//! use plansync_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use plansync_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let pipeline = ResiliencePipeline::new(
//!     Duration::from_secs(5),
//!     CircuitBreaker::new(CircuitBreakerConfig::default()),
//!     RetryPolicy::default(),
//! );
//!
//! let result = pipeline
//!     .execute(|| async { Ok::<_, String>(42) }, |err: &String| err.contains("transient"))
//!     .await;
//! assert_eq!(result.ok(), Some(42));
//! # }
//! ```

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError, State};
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::time_limiter::{TimeLimiter, TimeoutError};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure of a call made through a [`ResiliencePipeline`].
#[derive(Error, Debug)]
pub enum ResilienceError<E> {
    /// The overall time limit elapsed.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// The circuit breaker rejected the call.
    #[error("Circuit breaker is {0}")]
    CircuitOpen(State),
    /// The operation failed (after any retries).
    #[error("{0}")]
    Inner(E),
}

/// Time limit, circuit breaker and retry stacked in that order.
#[derive(Debug, Clone)]
pub struct ResiliencePipeline {
    time_limiter: TimeLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResiliencePipeline {
    /// Assemble a pipeline.
    #[must_use]
    pub const fn new(time_limit: Duration, breaker: CircuitBreaker, retry: RetryPolicy) -> Self {
        Self {
            time_limiter: TimeLimiter::new(time_limit),
            breaker,
            retry,
        }
    }

    /// The breaker guarding the call, for state inspection and manual control.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Retry policy in use.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Overall time limit.
    #[must_use]
    pub const fn time_limit(&self) -> Duration {
        self.time_limiter.limit()
    }

    /// Run `operation` through all three layers.
    ///
    /// # Errors
    ///
    /// - [`ResilienceError::Timeout`] when the limit elapses, whatever the
    ///   inner layers were doing.
    /// - [`ResilienceError::CircuitOpen`] when the breaker refuses the call.
    /// - [`ResilienceError::Inner`] with the last error otherwise.
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_retryable: P,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let retry = self.retry.clone();
        let guarded = self
            .breaker
            .call(move || retry_with_predicate(retry, operation, is_retryable));

        match self.time_limiter.call(guarded).await? {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::Open(state)) => Err(ResilienceError::CircuitOpen(state)),
            Err(CircuitBreakerError::Inner(err)) => Err(ResilienceError::Inner(err)),
        }
    }
}
