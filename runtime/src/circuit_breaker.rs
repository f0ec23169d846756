//! Rolling-window circuit breaker guarding calls to the plan provider.
//!
//! The breaker keeps the outcomes of the last `window_size` calls. Once at
//! least `minimum_calls` are in the window and the share of failures reaches
//! `failure_rate_threshold` percent, it opens and rejects calls for
//! `open_wait`. It then admits `half_open_calls` trial calls: all of them
//! succeeding closes it again, any one failing reopens it.
//!
//! # States
//!
//! - **Closed**: calls pass and their outcomes are recorded.
//! - **Open**: calls are rejected until `open_wait` elapses.
//! - **HalfOpen**: a limited number of trial calls decide between Closed and Open.
//! - **ForcedOpen**: operator override, every call is rejected.
//! - **Disabled**: operator override, every call passes and nothing is recorded.
//! - **MetricsOnly**: every call passes; outcomes are recorded but never trip it.
//!
//! # Example
//!
//! ```rust
//! use plansync_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, State};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .window_size(10)
//!         .minimum_calls(5)
//!         .failure_rate_threshold(50.0)
//!         .open_wait(Duration::from_secs(30))
//!         .build(),
//! );
//!
//! let feed = breaker.call(|| async { Ok::<_, String>("<planList/>") }).await;
//! assert!(feed.is_ok());
//! assert_eq!(breaker.state(), State::Closed);
//! # }
//! ```

use crate::metrics::CircuitBreakerMetrics;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of most recent call outcomes kept for the failure rate
    pub window_size: usize,
    /// Outcomes required in the window before the failure rate is evaluated
    pub minimum_calls: usize,
    /// Failure-rate percentage (0-100) at which the circuit opens
    pub failure_rate_threshold: f64,
    /// Duration to wait in Open before transitioning to `HalfOpen`
    pub open_wait: Duration,
    /// Trial calls permitted in `HalfOpen`
    pub half_open_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 50.0,
            open_wait: Duration::from_secs(30),
            half_open_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            window_size: None,
            minimum_calls: None,
            failure_rate_threshold: None,
            open_wait: None,
            half_open_calls: None,
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    window_size: Option<usize>,
    minimum_calls: Option<usize>,
    failure_rate_threshold: Option<f64>,
    open_wait: Option<Duration>,
    half_open_calls: Option<usize>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the size of the rolling outcome window.
    #[must_use]
    pub const fn window_size(mut self, size: usize) -> Self {
        self.window_size = Some(size);
        self
    }

    /// Set how many outcomes are needed before the rate is evaluated.
    #[must_use]
    pub const fn minimum_calls(mut self, calls: usize) -> Self {
        self.minimum_calls = Some(calls);
        self
    }

    /// Set the failure-rate percentage that opens the circuit.
    #[must_use]
    pub const fn failure_rate_threshold(mut self, percent: f64) -> Self {
        self.failure_rate_threshold = Some(percent);
        self
    }

    /// Set how long the circuit stays open before trial calls.
    #[must_use]
    pub const fn open_wait(mut self, duration: Duration) -> Self {
        self.open_wait = Some(duration);
        self
    }

    /// Set the number of trial calls in `HalfOpen`.
    #[must_use]
    pub const fn half_open_calls(mut self, calls: usize) -> Self {
        self.half_open_calls = Some(calls);
        self
    }

    /// Build the configuration.
    ///
    /// Sizes are clamped to at least 1 and `minimum_calls` to the window size.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        let defaults = CircuitBreakerConfig::default();
        let window_size = self.window_size.unwrap_or(defaults.window_size).max(1);
        CircuitBreakerConfig {
            window_size,
            minimum_calls: self
                .minimum_calls
                .unwrap_or(defaults.minimum_calls)
                .clamp(1, window_size),
            failure_rate_threshold: self
                .failure_rate_threshold
                .unwrap_or(defaults.failure_rate_threshold)
                .clamp(0.0, 100.0),
            open_wait: self.open_wait.unwrap_or(defaults.open_wait),
            half_open_calls: self
                .half_open_calls
                .unwrap_or(defaults.half_open_calls)
                .max(1),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately
    Open,
    /// Circuit is half-open, testing if service recovered
    HalfOpen,
    /// Circuit was opened manually and stays open until reset
    ForcedOpen,
    /// Circuit is bypassed
    Disabled,
    /// Outcomes are recorded but never change the state
    MetricsOnly,
}

impl State {
    /// Whether calls are rejected outright in this state.
    #[must_use]
    pub const fn rejects_calls(self) -> bool {
        matches!(self, Self::Open | Self::ForcedOpen)
    }

    /// Numeric encoding for the `circuit_breaker_state` gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
            Self::ForcedOpen => 3.0,
            Self::Disabled => 4.0,
            Self::MetricsOnly => 5.0,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
            Self::ForcedOpen => "FORCED_OPEN",
            Self::Disabled => "DISABLED",
            Self::MetricsOnly => "METRICS_ONLY",
        })
    }
}

/// Errors from circuit breaker operations.
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    /// Circuit rejected the request
    #[error("Circuit breaker is {0}")]
    Open(State),
    /// Operation failed
    #[error("Operation failed: {0}")]
    Inner(E),
}

/// Internal state of the circuit breaker.
#[derive(Debug)]
struct CircuitBreakerState {
    state: State,
    /// Rolling window of outcomes, `true` meaning failure.
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_issued: usize,
    half_open_successes: usize,
}

impl CircuitBreakerState {
    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.outcomes.iter().filter(|failed| **failed).count() as f64
            / self.outcomes.len() as f64;
        rate * 100.0
    }
}

/// Circuit breaker for preventing cascading failures.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
    counters: Arc<Counters>,
}

/// Lifetime totals, independent of the rolling window.
#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreakerMetrics::record_state(State::Closed);
        Self {
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: State::Closed,
                outcomes: VecDeque::with_capacity(config.window_size),
                opened_at: None,
                half_open_issued: 0,
                half_open_successes: 0,
            })),
            config: Arc::new(config),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state.
    ///
    /// An open circuit whose wait has elapsed reports (and becomes) `HalfOpen`.
    #[must_use]
    pub fn state(&self) -> State {
        let mut state = self.lock();
        self.expire_open(&mut state);
        state.state
    }

    /// Run `operation` if the breaker admits it, and record its outcome.
    ///
    /// If the returned future is dropped before the operation finishes, the
    /// call is recorded as a failure.
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError::Open` if the circuit rejects the call.
    /// Returns `CircuitBreakerError::Inner` if the operation fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        Counters::bump(&self.counters.calls);

        if let Err(state) = self.acquire_permission() {
            Counters::bump(&self.counters.rejections);
            CircuitBreakerMetrics::record_rejection();
            tracing::warn!(state = %state, "Call rejected by circuit breaker");
            return Err(CircuitBreakerError::Open(state));
        }
        CircuitBreakerMetrics::record_call();

        let mut guard = PendingCall {
            breaker: self,
            finished: false,
        };

        let result = operation().await;
        guard.finished = true;

        match result {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expire_open(&self, state: &mut CircuitBreakerState) {
        if state.state == State::Open
            && state
                .opened_at
                .is_some_and(|opened| opened.elapsed() >= self.config.open_wait)
        {
            Self::transition(state, State::HalfOpen);
            state.half_open_issued = 0;
            state.half_open_successes = 0;
        }
    }

    fn acquire_permission(&self) -> Result<(), State> {
        let mut state = self.lock();
        self.expire_open(&mut state);

        match state.state {
            State::Closed | State::Disabled | State::MetricsOnly => Ok(()),
            State::Open | State::ForcedOpen => Err(state.state),
            State::HalfOpen => {
                if state.half_open_issued < self.config.half_open_calls {
                    state.half_open_issued += 1;
                    Ok(())
                } else {
                    Err(State::HalfOpen)
                }
            }
        }
    }

    fn record_outcome(state: &mut CircuitBreakerState, failed: bool, window_size: usize) {
        state.outcomes.push_back(failed);
        while state.outcomes.len() > window_size {
            state.outcomes.pop_front();
        }
    }

    fn on_success(&self) {
        Counters::bump(&self.counters.successes);
        let mut state = self.lock();

        match state.state {
            State::Closed | State::MetricsOnly => {
                Self::record_outcome(&mut state, false, self.config.window_size);
            }
            State::HalfOpen => {
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.half_open_calls {
                    tracing::info!(
                        successes = state.half_open_successes,
                        "Trial calls succeeded"
                    );
                    Self::transition(&mut state, State::Closed);
                    state.outcomes.clear();
                    state.opened_at = None;
                }
            }
            State::Open | State::ForcedOpen | State::Disabled => {}
        }
    }

    fn on_failure(&self) {
        Counters::bump(&self.counters.failures);
        let mut state = self.lock();

        match state.state {
            State::Closed => {
                Self::record_outcome(&mut state, true, self.config.window_size);
                let failure_rate = state.failure_rate();
                if state.outcomes.len() >= self.config.minimum_calls
                    && failure_rate >= self.config.failure_rate_threshold
                {
                    tracing::warn!(
                        failure_rate,
                        threshold = self.config.failure_rate_threshold,
                        calls = state.outcomes.len(),
                        "Failure rate above threshold"
                    );
                    Self::transition(&mut state, State::Open);
                    state.opened_at = Some(Instant::now());
                }
            }
            State::MetricsOnly => {
                Self::record_outcome(&mut state, true, self.config.window_size);
            }
            State::HalfOpen => {
                tracing::warn!("Trial call failed, recovery not confirmed");
                Self::transition(&mut state, State::Open);
                state.opened_at = Some(Instant::now());
            }
            State::Open | State::ForcedOpen | State::Disabled => {}
        }
    }

    fn transition(state: &mut CircuitBreakerState, to: State) {
        if state.state == to {
            return;
        }
        tracing::info!(from = %state.state, to = %to, "Circuit breaker state transition");
        state.state = to;
        CircuitBreakerMetrics::record_state(to);
    }

    fn set_state(&self, to: State) {
        let mut state = self.lock();
        Self::transition(&mut state, to);
        state.outcomes.clear();
        state.opened_at = None;
        state.half_open_issued = 0;
        state.half_open_successes = 0;
    }

    /// Reject every call until [`reset`](Self::reset).
    pub fn force_open(&self) {
        self.set_state(State::ForcedOpen);
    }

    /// Let every call through without recording anything.
    pub fn disable(&self) {
        self.set_state(State::Disabled);
    }

    /// Let every call through, recording outcomes without ever tripping.
    pub fn metrics_only(&self) {
        self.set_state(State::MetricsOnly);
    }

    /// Close the breaker with an empty window.
    pub fn reset(&self) {
        tracing::info!("Circuit breaker manually reset");
        self.set_state(State::Closed);
    }

    /// Failure-rate percentage over the current window.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        self.lock().failure_rate()
    }

    /// Lifetime call totals.
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CircuitBreakerStats {
            total_calls: read(&self.counters.calls),
            total_successes: read(&self.counters.successes),
            total_failures: read(&self.counters.failures),
            total_rejections: read(&self.counters.rejections),
        }
    }
}

/// Records a failure if a permitted call is abandoned mid-flight.
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    finished: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Call abandoned before completion, counting as failure");
            self.breaker.on_failure();
        }
    }
}

/// Snapshot of a breaker's lifetime totals.
///
/// `total_calls` counts every call offered, so it equals admitted calls
/// (successes plus failures) plus rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    /// Calls offered to the breaker
    pub total_calls: u64,
    /// Admitted calls that succeeded
    pub total_successes: u64,
    /// Admitted calls that failed or were abandoned
    pub total_failures: u64,
    /// Calls turned away without running
    pub total_rejections: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn small_breaker(open_wait: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .window_size(4)
                .minimum_calls(2)
                .failure_rate_threshold(50.0)
                .open_wait(open_wait)
                .half_open_calls(2)
                .build(),
        )
    }

    async fn fail(breaker: &CircuitBreaker, times: usize) {
        for _ in 0..times {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_on_success() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;

        assert!(result.is_ok());
        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_minimum_calls_gate_the_failure_rate() {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .window_size(10)
                .minimum_calls(5)
                .build(),
        );

        fail(&breaker, 4).await;
        assert_eq!(breaker.state(), State::Closed);

        fail(&breaker, 1).await;
        assert_eq!(breaker.state(), State::Open);
    }

    #[tokio::test]
    async fn test_failure_rate_below_threshold_stays_closed() {
        let breaker = small_breaker(Duration::from_secs(60));

        for _ in 0..3 {
            let _ = breaker.call(|| async { Ok::<_, String>(1) }).await;
        }
        fail(&breaker, 1).await;

        assert_eq!(breaker.state(), State::Closed);
        assert!((breaker.failure_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_circuit_breaker_rejects_when_open() {
        let breaker = small_breaker(Duration::from_secs(60));
        fail(&breaker, 2).await;

        let counter = AtomicUsize::new(0);
        let counter_ref = &counter;
        let result = breaker
            .call(|| async move {
                counter_ref.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open(State::Open))));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.stats().total_rejections, 1);
    }

    #[tokio::test]
    async fn test_state_reports_half_open_after_wait() {
        let breaker = small_breaker(Duration::from_millis(50));
        fail(&breaker, 2).await;
        assert_eq!(breaker.state(), State::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(breaker.state(), State::HalfOpen);
    }

    #[tokio::test]
    async fn test_circuit_breaker_closes_after_trial_successes() {
        let breaker = small_breaker(Duration::from_millis(50));
        fail(&breaker, 2).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        for _ in 0..2 {
            let _ = breaker.call(|| async { Ok::<_, String>(42) }).await;
        }

        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_half_open_limits_trial_calls() {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .window_size(2)
                .minimum_calls(1)
                .open_wait(Duration::from_millis(10))
                .half_open_calls(1)
                .build(),
        );
        fail(&breaker, 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let slow = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        let _ = wait.await;
                        Ok::<_, String>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = breaker.call(|| async { Ok::<_, String>(()) }).await;
        assert!(matches!(
            second,
            Err(CircuitBreakerError::Open(State::HalfOpen))
        ));

        let _ = release.send(());
        assert!(slow.await.is_ok_and(|r| r.is_ok()));
        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_circuit_breaker_reopens_on_half_open_failure() {
        let breaker = small_breaker(Duration::from_millis(50));
        fail(&breaker, 2).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        fail(&breaker, 1).await;

        assert_eq!(breaker.state(), State::Open);
    }

    #[tokio::test]
    async fn test_manual_states() {
        let breaker = small_breaker(Duration::from_millis(10));

        breaker.force_open();
        assert_eq!(breaker.state(), State::ForcedOpen);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(breaker.state(), State::ForcedOpen);
        assert!(matches!(
            breaker.call(|| async { Ok::<_, String>(()) }).await,
            Err(CircuitBreakerError::Open(State::ForcedOpen))
        ));

        breaker.disable();
        fail(&breaker, 10).await;
        assert_eq!(breaker.state(), State::Disabled);

        breaker.metrics_only();
        fail(&breaker, 10).await;
        assert_eq!(breaker.state(), State::MetricsOnly);
        assert!((breaker.failure_rate() - 100.0).abs() < f64::EPSILON);

        breaker.reset();
        assert_eq!(breaker.state(), State::Closed);
        assert!(breaker.failure_rate().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_abandoned_call_counts_as_failure() {
        let breaker = small_breaker(Duration::from_secs(60));

        for _ in 0..2 {
            let pending = breaker.call(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, String>(())
            });
            let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;
        }

        assert_eq!(breaker.state(), State::Open);
        assert_eq!(breaker.stats().total_failures, 2);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::ForcedOpen.to_string(), "FORCED_OPEN");
        assert_eq!(State::HalfOpen.to_string(), "HALF_OPEN");
        assert!(State::Open.rejects_calls());
        assert!(!State::MetricsOnly.rejects_calls());
    }

    #[tokio::test]
    async fn test_stats_add_up() {
        let breaker = small_breaker(Duration::from_secs(60));

        for _ in 0..3 {
            let _ = breaker.call(|| async { Ok::<_, String>(42) }).await;
        }
        fail(&breaker, 2).await;
        fail(&breaker, 1).await;

        let stats = breaker.stats();
        assert_eq!(
            stats,
            CircuitBreakerStats {
                total_calls: 6,
                total_successes: 3,
                total_failures: 2,
                total_rejections: 1,
            }
        );
        assert_eq!(
            stats.total_calls,
            stats.total_successes + stats.total_failures + stats.total_rejections
        );
    }

    #[tokio::test]
    async fn test_clones_share_state_across_tasks() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..50 {
            let breaker = breaker.clone();
            tasks.spawn(async move { breaker.call(|| async { Ok::<_, String>(()) }).await.is_ok() });
        }
        let admitted = tasks.join_all().await.into_iter().filter(|ok| *ok).count();

        assert_eq!(admitted, 50);
        assert_eq!(breaker.stats().total_successes, 50);
        assert_eq!(breaker.state(), State::Closed);
    }
}
