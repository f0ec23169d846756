//! # Plansync Runtime
//!
//! Resilience building blocks for calls to the plan provider and the
//! observability plumbing shared by every crate in the workspace.
//!
//! ## Components
//!
//! - **Retry**: exponential backoff with a retryability predicate
//! - **Circuit Breaker**: rolling-window failure rate with manual override states
//! - **Time Limiter**: hard wall-clock bound on a future
//! - **Resilience Pipeline**: the three policies composed in a fixed order
//! - **Metrics**: Prometheus exporter and typed metric recorders
//!
//! ## Example
//!
//! ```rust
//! use plansync_runtime::{CircuitBreaker, CircuitBreakerConfig, ResiliencePipeline, RetryPolicy};
//! use std::time::Duration;
//!
//! let pipeline = ResiliencePipeline::new(
//!     Duration::from_secs(5),
//!     CircuitBreaker::new(CircuitBreakerConfig::default()),
//!     RetryPolicy::default(),
//! );
//! assert_eq!(pipeline.time_limit(), Duration::from_secs(5));
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Circuit breaker pattern for preventing cascading failures
pub mod circuit_breaker;

/// Wall-clock limits for async operations
pub mod time_limiter;

/// Time limit, circuit breaker and retry composed around one call
pub mod resilience;

/// Prometheus metrics for observability
pub mod metrics;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, State,
};
pub use resilience::{ResilienceError, ResiliencePipeline};
pub use retry::{Backoff, RetryPolicy, RetryPolicyBuilder, retry_with_predicate};
pub use time_limiter::{TimeLimiter, TimeoutError};
