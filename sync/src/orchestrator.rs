//! One full sync run: breaker check, fetch, batch processing.

use crate::batch::BatchProcessor;
use crate::result::{BatchProcessingResult, SyncJobResult};
use futures::FutureExt;
use plansync_core::environment::Clock;
use plansync_provider::{ProviderClient, ProviderError};
use plansync_runtime::State;
use plansync_runtime::metrics::SyncMetrics;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Chunk size used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// A unit of work the scheduler can trigger.
///
/// Implementations never fail: every problem is reported inside the
/// returned [`SyncJobResult`].
pub trait SyncJob: Send + Sync {
    /// Run once.
    fn run(&self) -> Pin<Box<dyn Future<Output = SyncJobResult> + Send + '_>>;
}

/// Ties the provider client and the batch processor together.
///
/// This is the outermost error boundary of a run: provider errors and panics
/// raised while fetching or processing become a failed [`SyncJobResult`].
#[derive(Clone)]
pub struct SyncJobOrchestrator {
    client: Arc<dyn ProviderClient>,
    processor: BatchProcessor,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl SyncJobOrchestrator {
    /// Create an orchestrator using [`DEFAULT_BATCH_SIZE`].
    #[must_use]
    pub fn new(
        client: Arc<dyn ProviderClient>,
        processor: BatchProcessor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            processor,
            clock,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the chunk size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run a full sync.
    ///
    /// Makes no provider call at all while the breaker is `OPEN` or
    /// `FORCED_OPEN`.
    #[tracing::instrument(skip_all)]
    pub async fn orchestrate_full_sync(&self) -> SyncJobResult {
        let started_at = self.clock.now();
        let timer = Instant::now();

        let state = self.client.circuit_state();
        let outcome = if state.rejects_calls() {
            tracing::warn!(circuit_state = %state, "Circuit breaker open, skipping sync");
            Err(format!("Circuit Breaker is {state}"))
        } else {
            log_state(state);
            match AssertUnwindSafe(self.fetch_and_process()).catch_unwind().await {
                Ok(Ok(batch)) => Ok(batch),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, kind = %e.kind(), "Sync run failed");
                    Err(e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(error = %message, "Sync run panicked");
                    Err(message)
                }
            }
        };

        let elapsed = timer.elapsed();
        let completed_at = self.clock.now();
        let result = match outcome {
            Ok(batch) => SyncJobResult::completed(&batch, started_at, completed_at, elapsed),
            Err(error) => SyncJobResult::failed(error, started_at, completed_at, elapsed),
        };

        SyncMetrics::record_run(result.success, elapsed);
        result
    }

    async fn fetch_and_process(&self) -> Result<BatchProcessingResult, ProviderError> {
        let records = self.client.fetch_plans().await?;
        tracing::info!(plans = records.len(), "Fetched plans from provider");
        Ok(self.processor.process_batch(&records, self.batch_size).await)
    }
}

impl SyncJob for SyncJobOrchestrator {
    fn run(&self) -> Pin<Box<dyn Future<Output = SyncJobResult> + Send + '_>> {
        Box::pin(self.orchestrate_full_sync())
    }
}

fn log_state(state: State) {
    match state {
        State::Closed => tracing::info!("Circuit breaker healthy, proceeding with sync"),
        State::HalfOpen => tracing::info!("Circuit breaker testing recovery"),
        other => tracing::info!(circuit_state = %other, "Proceeding with sync"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}
