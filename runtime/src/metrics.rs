//! Prometheus metrics for the sync pipeline.
//!
//! Recording goes through the `metrics` facade, so the recorder types below
//! are cheap no-ops until [`MetricsServer::install`] puts an exporter in
//! place. Every metric the workspace emits is listed in [`DESCRIPTIONS`].
//!
//! # Example
//!
//! ```rust,no_run
//! use plansync_runtime::metrics::{MetricsServer, SyncMetrics};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let _server = MetricsServer::install("0.0.0.0:9090".parse()?)?;
//! SyncMetrics::record_run(true, Duration::from_millis(250));
//! // Scrape http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use crate::circuit_breaker::State;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The exporter could not be configured.
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
}

/// Kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic count.
    Counter,
    /// Point-in-time value.
    Gauge,
    /// Distribution of observations.
    Histogram,
}

/// Name, kind and help text of every metric the workspace records.
pub const DESCRIPTIONS: &[(&str, MetricKind, &str)] = &[
    ("sync_runs_total", MetricKind::Counter, "Orchestration runs by outcome"),
    ("sync_run_duration_seconds", MetricKind::Histogram, "Wall-clock duration of an orchestration run"),
    ("sync_runs_skipped_total", MetricKind::Counter, "Scheduler invocations that did not start a run, by reason"),
    ("sync_plans_created_total", MetricKind::Counter, "Plans created"),
    ("sync_plans_updated_total", MetricKind::Counter, "Plans updated"),
    ("sync_plans_unchanged_total", MetricKind::Counter, "Plans left untouched because nothing material changed"),
    ("sync_plans_failed_total", MetricKind::Counter, "Plans that failed reconciliation"),
    ("sync_batch_mapping_failures_total", MetricKind::Counter, "Provider records that could not become a valid plan"),
    ("sync_batch_service_failures_total", MetricKind::Counter, "Valid plans that could not be reconciled against the store"),
    ("provider_fetch_duration_seconds", MetricKind::Histogram, "Time taken to fetch the provider feed"),
    ("provider_plans_fetched_total", MetricKind::Counter, "Online plan records returned by the provider"),
    ("circuit_breaker_state", MetricKind::Gauge, "Breaker state (0=closed, 1=half-open, 2=open, 3=forced-open, 4=disabled, 5=metrics-only)"),
    ("circuit_breaker_calls_total", MetricKind::Counter, "Calls admitted by the breaker"),
    ("circuit_breaker_rejections_total", MetricKind::Counter, "Calls rejected by the breaker"),
    ("retry_attempts_total", MetricKind::Counter, "Retries performed"),
    ("retry_exhausted_total", MetricKind::Counter, "Operations that used up every attempt"),
    ("domain_events_published_total", MetricKind::Counter, "Domain events dispatched to handlers, by type"),
    ("cache_invalidations_total", MetricKind::Counter, "Read-side cache invalidations broadcast"),
];

/// Latency buckets, in seconds, for every `*_duration_seconds` histogram.
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Prometheus exporter serving `/metrics` over HTTP.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Install the global recorder and start listening on `addr`.
    ///
    /// Must be called from within a Tokio runtime. If another recorder is
    /// already installed the call still succeeds, but the returned server has
    /// no handle and [`render`](Self::render) returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built.
    pub fn install(addr: SocketAddr) -> Result<Self, MetricsError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), DURATION_BUCKETS)
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        // Setting the global recorder only fails when one is already in place.
        if let Err(metrics::SetRecorderError(_)) = metrics::set_global_recorder(recorder) {
            tracing::warn!("Metrics recorder already installed, reusing it");
            return Ok(Self { addr, handle: None });
        }

        describe_all();
        tokio::spawn(async move {
            if let Err(_e) = exporter.await {
                // ExporterError (metrics-exporter-prometheus 0.15) implements neither Debug nor Display.
                tracing::error!("Metrics exporter stopped");
            }
        });
        tracing::info!(%addr, "Metrics available at http://{addr}/metrics");

        Ok(Self {
            addr,
            handle: Some(handle),
        })
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current metrics in Prometheus text format, if this server owns the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_all() {
    for &(name, kind, help) in DESCRIPTIONS {
        match kind {
            MetricKind::Counter => describe_counter!(name, help),
            MetricKind::Gauge => describe_gauge!(name, help),
            MetricKind::Histogram => describe_histogram!(name, help),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn as_count(n: usize) -> u64 {
    n as u64
}

/// Run, plan and chunk outcomes.
pub struct SyncMetrics;

impl SyncMetrics {
    /// A finished orchestration run.
    pub fn record_run(success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "failure" };
        counter!("sync_runs_total", "outcome" => outcome).increment(1);
        histogram!("sync_run_duration_seconds").record(duration.as_secs_f64());
    }

    /// A scheduler invocation that did not start a run.
    pub fn record_skipped(reason: &'static str) {
        counter!("sync_runs_skipped_total", "reason" => reason).increment(1);
    }

    /// A plan stored for the first time.
    pub fn record_created() {
        counter!("sync_plans_created_total").increment(1);
    }

    /// A plan moved to its next version.
    pub fn record_updated() {
        counter!("sync_plans_updated_total").increment(1);
    }

    /// A plan found up to date.
    pub fn record_unchanged() {
        counter!("sync_plans_unchanged_total").increment(1);
    }

    /// A plan given up on.
    pub fn record_failed() {
        counter!("sync_plans_failed_total").increment(1);
    }

    /// Records of one chunk rejected at mapping.
    pub fn record_mapping_failures(count: usize) {
        if count > 0 {
            counter!("sync_batch_mapping_failures_total").increment(as_count(count));
        }
    }

    /// Plans of one chunk the service did not reconcile.
    pub fn record_service_failures(count: usize) {
        if count > 0 {
            counter!("sync_batch_service_failures_total").increment(as_count(count));
        }
    }
}

/// Provider feed fetches.
pub struct ProviderMetrics;

impl ProviderMetrics {
    /// A fetch that returned `plans` online records.
    pub fn record_fetch(plans: usize, duration: Duration) {
        counter!("provider_plans_fetched_total").increment(as_count(plans));
        histogram!("provider_fetch_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Circuit breaker activity.
pub struct CircuitBreakerMetrics;

impl CircuitBreakerMetrics {
    /// The breaker's current state.
    pub fn record_state(state: State) {
        gauge!("circuit_breaker_state").set(state.as_gauge());
    }

    /// A call admitted.
    pub fn record_call() {
        counter!("circuit_breaker_calls_total").increment(1);
    }

    /// A call rejected without running.
    pub fn record_rejection() {
        counter!("circuit_breaker_rejections_total").increment(1);
    }
}

/// Retry activity.
pub struct RetryMetrics;

impl RetryMetrics {
    /// One retry about to happen.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// An operation that failed on its last attempt.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}

/// Domain event dispatch.
pub struct EventMetrics;

impl EventMetrics {
    /// An event handed to in-process handlers.
    pub fn record_published(event_type: &'static str) {
        counter!("domain_events_published_total", "event_type" => event_type).increment(1);
    }

    /// A plan id broadcast for cache eviction.
    pub fn record_cache_invalidation() {
        counter!("cache_invalidations_total").increment(1);
    }
}
