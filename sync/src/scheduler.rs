//! Periodic trigger with overlap prevention and readiness gating.

use crate::config::SyncSettings;
use crate::orchestrator::SyncJob;
use crate::result::SyncJobResult;
use plansync_core::repository::PlanRepository;
use plansync_runtime::metrics::SyncMetrics;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Checks that the backing store can serve a run.
pub trait ReadinessProbe: Send + Sync {
    /// Probe once.
    ///
    /// # Errors
    ///
    /// Returns a description of why the store is not ready.
    fn check(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>>;
}

/// [`ReadinessProbe`] that pings a [`PlanRepository`].
#[derive(Clone)]
pub struct RepositoryReadiness {
    repository: Arc<dyn PlanRepository>,
}

impl RepositoryReadiness {
    /// Probe `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn PlanRepository>) -> Self {
        Self { repository }
    }
}

impl ReadinessProbe for RepositoryReadiness {
    fn check(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>> {
        Box::pin(async move { self.repository.ping().await.map_err(|e| e.to_string()) })
    }
}

/// What one scheduler invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sync is administratively disabled.
    Disabled,
    /// Another run holds the overlap guard.
    AlreadyRunning,
    /// The readiness probe failed or timed out.
    NotReady,
    /// A run executed.
    Completed(SyncJobResult),
}

/// Releases the overlap flag when dropped, including during unwinding.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a [`SyncJob`] on a fixed delay, never more than one at a time.
#[derive(Clone)]
pub struct SyncScheduler {
    job: Arc<dyn SyncJob>,
    readiness: Arc<dyn ReadinessProbe>,
    enabled: bool,
    interval: Duration,
    readiness_timeout: Duration,
    in_progress: Arc<AtomicBool>,
}

impl SyncScheduler {
    /// Create an enabled scheduler with a 10s interval and a 3s readiness timeout.
    #[must_use]
    pub fn new(job: Arc<dyn SyncJob>, readiness: Arc<dyn ReadinessProbe>) -> Self {
        Self {
            job,
            readiness,
            enabled: true,
            interval: Duration::from_secs(10),
            readiness_timeout: Duration::from_secs(3),
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Apply enable flag, interval and readiness timeout from `settings`.
    #[must_use]
    pub const fn with_settings(mut self, settings: &SyncSettings) -> Self {
        self.enabled = settings.enabled;
        self.interval = settings.interval;
        self.readiness_timeout = settings.readiness_timeout;
        self
    }

    /// Enable or disable runs.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Delay between runs.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Limit for the readiness probe.
    #[must_use]
    pub const fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Whether a run currently holds the overlap guard.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Perform one scheduled invocation.
    pub async fn tick(&self) -> TickOutcome {
        if !self.enabled {
            tracing::info!("Sync is disabled, skipping");
            SyncMetrics::record_skipped("disabled");
            return TickOutcome::Disabled;
        }

        let Some(_guard) = RunGuard::acquire(&self.in_progress) else {
            tracing::warn!("Sync already in progress, skipping this execution");
            SyncMetrics::record_skipped("in_progress");
            return TickOutcome::AlreadyRunning;
        };

        if !self.is_ready().await {
            SyncMetrics::record_skipped("not_ready");
            return TickOutcome::NotReady;
        }

        tracing::info!("Scheduler triggering sync");
        let result = self.job.run().await;
        if result.success {
            tracing::info!(
                total_plans = result.total_plans,
                successful_plans = result.successful_plans,
                failed_plans = result.failed_plans,
                execution_time_ms = result.execution_time_ms,
                "Sync completed"
            );
        } else {
            tracing::error!(errors = ?result.errors, "Sync failed");
        }
        TickOutcome::Completed(result)
    }

    /// Tick until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// The first tick fires immediately. Later ticks keep a fixed delay after
    /// the previous one, so a slow run pushes the schedule back. A run in
    /// progress always finishes before shutdown is observed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Sync scheduler started");
        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Sync scheduler stopped");
    }

    async fn is_ready(&self) -> bool {
        match tokio::time::timeout(self.readiness_timeout, self.readiness.check()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Store not ready, skipping sync");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.readiness_timeout.as_millis(),
                    "Readiness check timed out, skipping sync"
                );
                false
            }
        }
    }
}
