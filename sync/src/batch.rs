//! Chunked mapping and reconciliation of provider records.

use crate::mapping;
use crate::result::{BatchProcessingResult, BatchResult};
use plansync_core::environment::Clock;
use plansync_core::repository::RepositoryError;
use plansync_core::Plan;
use plansync_provider::ProviderPlanRecord;
use plansync_runtime::metrics::SyncMetrics;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a whole [`PlanSync::sync_plans`] call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The store failed for the whole group.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Any other failure of the reconciliation step.
    #[error("Sync failed: {0}")]
    Failed(String),
}

/// Reconciles a group of mapped plans.
///
/// The returned list holds the plans that were reconciled. A plan absent
/// from it failed individually. An `Err` fails the whole group.
pub trait PlanSync: Send + Sync {
    /// Reconcile `plans`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the group as a whole could not be processed.
    fn sync_plans(
        &self,
        plans: Vec<Plan>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Plan>, SyncError>> + Send + '_>>;
}

/// Splits a feed into chunks, maps every record and hands valid plans to a
/// [`PlanSync`], one chunk at a time.
///
/// A record that fails mapping is counted and skipped; the rest of its chunk
/// is still reconciled.
#[derive(Clone)]
pub struct BatchProcessor {
    sync: Arc<dyn PlanSync>,
    clock: Arc<dyn Clock>,
}

impl BatchProcessor {
    /// Create a processor.
    #[must_use]
    pub fn new(sync: Arc<dyn PlanSync>, clock: Arc<dyn Clock>) -> Self {
        Self { sync, clock }
    }

    /// Process `records` in chunks of `batch_size` (at least 1), in feed order.
    #[tracing::instrument(skip_all, fields(records = records.len(), batch_size = batch_size))]
    pub async fn process_batch(
        &self,
        records: &[ProviderPlanRecord],
        batch_size: usize,
    ) -> BatchProcessingResult {
        if records.is_empty() {
            return BatchProcessingResult::empty();
        }

        let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size.max(1)));
        for (batch_number, chunk) in records.chunks(batch_size.max(1)).enumerate() {
            batches.push(self.process_chunk(batch_number, chunk).await);
        }

        let result = BatchProcessingResult::from_batches(batches);
        tracing::info!(
            total_batches = result.total_batches,
            successful_plans = result.successful_plans,
            failed_plans = result.failed_plans,
            mapping_failures = result.mapping_failures,
            service_failures = result.service_failures,
            "Batch processing finished"
        );
        result
    }

    async fn process_chunk(&self, batch_number: usize, chunk: &[ProviderPlanRecord]) -> BatchResult {
        tracing::debug!(batch_number, plans = chunk.len(), "Processing batch");

        let mut errors = Vec::new();
        let mut plans = Vec::with_capacity(chunk.len());
        for record in chunk {
            match mapping::to_plan(record, self.clock.as_ref()) {
                Ok(plan) => plans.push(plan),
                Err(e) => {
                    tracing::warn!(
                        batch_number,
                        base_plan_id = %record.base_plan_id,
                        error = %e,
                        "Failed to map plan"
                    );
                    errors.push(format!("Plan {}: {e}", record.base_plan_id));
                }
            }
        }
        let mapping_failures = errors.len();

        let mut success_count = 0;
        let mut service_failures = 0;
        if !plans.is_empty() {
            let submitted: Vec<String> = plans
                .iter()
                .map(|plan| plan.provider_plan_id().as_str().to_string())
                .collect();

            match self.sync.sync_plans(plans).await {
                Ok(synced) => {
                    // Counted per id so a duplicate id in one chunk is matched once per copy.
                    let mut returned: HashMap<&str, usize> = HashMap::new();
                    for plan in &synced {
                        *returned.entry(plan.provider_plan_id().as_str()).or_default() += 1;
                    }
                    for id in &submitted {
                        match returned.get_mut(id.as_str()) {
                            Some(remaining) if *remaining > 0 => *remaining -= 1,
                            _ => {
                                errors.push(format!("Plan {id}: reconciliation failed"));
                                service_failures += 1;
                            }
                        }
                    }
                    success_count = submitted.len() - service_failures;
                }
                Err(e) => {
                    tracing::error!(batch_number, error = %e, "Service failed to process batch");
                    errors.push(format!("Batch {batch_number}: {e}"));
                    service_failures = submitted.len();
                }
            }
        }

        SyncMetrics::record_mapping_failures(mapping_failures);
        SyncMetrics::record_service_failures(service_failures);

        BatchResult {
            batch_number,
            plans_processed: chunk.len(),
            success_count,
            error_count: mapping_failures + service_failures,
            mapping_failures,
            service_failures,
            errors,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use plansync_testing::{PlanRecordBuilder, test_clock};
    use std::sync::Mutex;

    /// Accepts every plan except the configured ids, or fails outright.
    #[derive(Default)]
    struct ScriptedSync {
        reject: Vec<String>,
        fail: Option<SyncError>,
        first_of_each_id: bool,
        calls: Mutex<Vec<usize>>,
    }

    impl PlanSync for ScriptedSync {
        fn sync_plans(
            &self,
            plans: Vec<Plan>,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Plan>, SyncError>> + Send + '_>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(plans.len());
                if let Some(error) = self.fail.clone() {
                    return Err(error);
                }
                let mut seen = Vec::new();
                Ok(plans
                    .into_iter()
                    .filter(|p| !self.reject.contains(&p.provider_plan_id().as_str().to_string()))
                    .filter(|p| {
                        let id = p.provider_plan_id().as_str().to_string();
                        if !self.first_of_each_id {
                            return true;
                        }
                        if seen.contains(&id) {
                            return false;
                        }
                        seen.push(id);
                        true
                    })
                    .collect())
            })
        }
    }

    fn processor(sync: Arc<ScriptedSync>) -> BatchProcessor {
        BatchProcessor::new(sync, Arc::new(test_clock()))
    }

    fn records(count: usize) -> Vec<ProviderPlanRecord> {
        (0..count)
            .map(|i| PlanRecordBuilder::new(&format!("P{i}")).build())
            .collect()
    }

    #[tokio::test]
    async fn test_records_are_chunked_in_order() {
        let sync = Arc::new(ScriptedSync::default());
        let result = processor(Arc::clone(&sync)).process_batch(&records(45), 20).await;

        assert_eq!(*sync.calls.lock().unwrap(), vec![20, 20, 5]);
        assert_eq!(result.total_batches, 3);
        assert_eq!(result.successful_batches, 3);
        assert_eq!(result.total_plans, 45);
        assert_eq!(result.successful_plans, 45);
        assert_eq!(
            result.batches.iter().map(|b| b.batch_number).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_empty_feed_makes_no_calls() {
        let sync = Arc::new(ScriptedSync::default());
        let result = processor(Arc::clone(&sync)).process_batch(&[], 20).await;

        assert_eq!(result, BatchProcessingResult::empty());
        assert!(sync.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mapping_failure_is_isolated() {
        let sync = Arc::new(ScriptedSync::default());
        let mut feed = records(5);
        feed[2] = PlanRecordBuilder::new("bad").price("not-a-price").build();

        let result = processor(Arc::clone(&sync)).process_batch(&feed, 20).await;

        assert_eq!(*sync.calls.lock().unwrap(), vec![4]);
        assert_eq!(result.mapping_failures, 1);
        assert_eq!(result.service_failures, 0);
        assert_eq!(result.successful_plans, 4);
        assert_eq!(result.failed_plans, 1);
        assert_eq!(result.partially_failed_batches, 1);
        assert!(result.errors()[0].starts_with("Plan bad:"));
    }

    #[tokio::test]
    async fn test_chunk_of_only_invalid_records_skips_the_service() {
        let sync = Arc::new(ScriptedSync::default());
        let feed = vec![
            PlanRecordBuilder::new("a").without_zones().build(),
            PlanRecordBuilder::new("b").title("").build(),
        ];

        let result = processor(Arc::clone(&sync)).process_batch(&feed, 20).await;

        assert!(sync.calls.lock().unwrap().is_empty());
        assert_eq!(result.failed_batches, 1);
        assert_eq!(result.mapping_failures, 2);
    }

    #[tokio::test]
    async fn test_plans_missing_from_service_result_are_service_failures() {
        let sync = Arc::new(ScriptedSync {
            reject: vec!["P1".to_string(), "P3".to_string()],
            ..ScriptedSync::default()
        });

        let result = processor(sync).process_batch(&records(4), 20).await;

        assert_eq!(result.successful_plans, 2);
        assert_eq!(result.service_failures, 2);
        assert_eq!(result.failed_plans, 2);
        assert_eq!(
            result.errors(),
            vec![
                "Plan P1: reconciliation failed".to_string(),
                "Plan P3: reconciliation failed".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_counts_each_copy_separately() {
        let sync = Arc::new(ScriptedSync {
            first_of_each_id: true,
            ..ScriptedSync::default()
        });
        let feed = vec![
            PlanRecordBuilder::new("P1").title("A").build(),
            PlanRecordBuilder::new("P1").title("B").build(),
        ];

        let result = processor(Arc::clone(&sync)).process_batch(&feed, 20).await;

        assert_eq!(*sync.calls.lock().unwrap(), vec![2]);
        assert_eq!(result.successful_plans, 1);
        assert_eq!(result.service_failures, 1);
        assert_eq!(result.failed_plans, 1);
        assert_eq!(result.errors(), vec!["Plan P1: reconciliation failed".to_string()]);
    }

    #[tokio::test]
    async fn test_service_error_fails_only_its_chunk() {
        let sync = Arc::new(ScriptedSync {
            fail: Some(SyncError::Failed("store down".to_string())),
            ..ScriptedSync::default()
        });

        let result = processor(sync).process_batch(&records(3), 2).await;

        assert_eq!(result.total_batches, 2);
        assert_eq!(result.failed_batches, 2);
        assert_eq!(result.service_failures, 3);
        assert_eq!(result.successful_plans, 0);
        assert_eq!(result.errors()[0], "Batch 0: Sync failed: store down");
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_treated_as_one() {
        let sync = Arc::new(ScriptedSync::default());
        let result = processor(Arc::clone(&sync)).process_batch(&records(3), 0).await;

        assert_eq!(result.total_batches, 3);
        assert_eq!(*sync.calls.lock().unwrap(), vec![1, 1, 1]);
    }
}
