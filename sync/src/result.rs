//! Outcome types for batch processing and whole sync runs.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Zero-based position of the chunk in the run.
    pub batch_number: usize,
    /// Records in the chunk.
    pub plans_processed: usize,
    /// Plans reconciled.
    pub success_count: usize,
    /// Records that failed, for any reason.
    pub error_count: usize,
    /// Records that could not become a valid plan.
    pub mapping_failures: usize,
    /// Valid plans that could not be reconciled.
    pub service_failures: usize,
    /// Human-readable failure descriptions.
    pub errors: Vec<String>,
}

impl BatchResult {
    /// No record failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error_count == 0
    }

    /// Every record failed.
    #[must_use]
    pub const fn is_complete_failure(&self) -> bool {
        self.error_count > 0 && self.error_count == self.plans_processed
    }

    /// Some, but not all, records failed.
    #[must_use]
    pub const fn is_partial_failure(&self) -> bool {
        self.error_count > 0 && self.error_count < self.plans_processed
    }
}

/// Aggregate outcome of processing every chunk of one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchProcessingResult {
    /// Chunks processed.
    pub total_batches: usize,
    /// Chunks without failures.
    pub successful_batches: usize,
    /// Chunks where every record failed.
    pub failed_batches: usize,
    /// Chunks with some failures.
    pub partially_failed_batches: usize,
    /// Records seen.
    pub total_plans: usize,
    /// Plans reconciled.
    pub successful_plans: usize,
    /// Records that failed.
    pub failed_plans: usize,
    /// Records rejected at mapping.
    pub mapping_failures: usize,
    /// Plans rejected by the sync service.
    pub service_failures: usize,
    /// Per-chunk details, in order.
    pub batches: Vec<BatchResult>,
}

impl BatchProcessingResult {
    /// Result for an empty feed.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sum per-chunk results.
    #[must_use]
    pub fn from_batches(batches: Vec<BatchResult>) -> Self {
        let mut result = Self {
            total_batches: batches.len(),
            ..Self::default()
        };

        for batch in &batches {
            if batch.is_success() {
                result.successful_batches += 1;
            } else if batch.is_complete_failure() {
                result.failed_batches += 1;
            } else {
                result.partially_failed_batches += 1;
            }
            result.total_plans += batch.plans_processed;
            result.successful_plans += batch.success_count;
            result.failed_plans += batch.error_count;
            result.mapping_failures += batch.mapping_failures;
            result.service_failures += batch.service_failures;
        }

        result.batches = batches;
        result
    }

    /// Every failure description across all chunks.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.batches
            .iter()
            .flat_map(|batch| batch.errors.iter().cloned())
            .collect()
    }
}

/// Outcome of one orchestration run.
///
/// `success` says whether the run completed. A run in which every plan failed
/// still completed; the per-plan picture is in the counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJobResult {
    /// The run completed without a run-level failure.
    pub success: bool,
    /// Records fetched.
    pub total_plans: usize,
    /// Plans reconciled.
    pub successful_plans: usize,
    /// Records that failed.
    pub failed_plans: usize,
    /// Wall-clock duration.
    pub execution_time_ms: u64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Failure descriptions.
    pub errors: Vec<String>,
}

impl SyncJobResult {
    /// A completed run.
    #[must_use]
    pub fn completed(
        batch: &BatchProcessingResult,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: true,
            total_plans: batch.total_plans,
            successful_plans: batch.successful_plans,
            failed_plans: batch.failed_plans,
            execution_time_ms: millis(elapsed),
            started_at,
            completed_at,
            errors: batch.errors(),
        }
    }

    /// A run that stopped with a single run-level error.
    #[must_use]
    pub fn failed(
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: false,
            total_plans: 0,
            successful_plans: 0,
            failed_plans: 0,
            execution_time_ms: millis(elapsed),
            started_at,
            completed_at,
            errors: vec![error.into()],
        }
    }

    /// Percentage of plans reconciled, 0 to 100. An empty run counts as 100.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_plans == 0 {
            return 100.0;
        }
        self.successful_plans as f64 / self.total_plans as f64 * 100.0
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(number: usize, processed: usize, mapping: usize, service: usize) -> BatchResult {
        BatchResult {
            batch_number: number,
            plans_processed: processed,
            success_count: processed - mapping - service,
            error_count: mapping + service,
            mapping_failures: mapping,
            service_failures: service,
            errors: vec!["e".to_string(); mapping + service],
        }
    }

    #[test]
    fn test_batches_are_classified_by_error_count() {
        let result = BatchProcessingResult::from_batches(vec![
            batch(0, 20, 0, 0),
            batch(1, 20, 2, 1),
            batch(2, 5, 3, 2),
        ]);

        assert_eq!(result.total_batches, 3);
        assert_eq!(result.successful_batches, 1);
        assert_eq!(result.partially_failed_batches, 1);
        assert_eq!(result.failed_batches, 1);
        assert_eq!(result.total_plans, 45);
        assert_eq!(result.successful_plans, 37);
        assert_eq!(result.failed_plans, 8);
        assert_eq!(result.mapping_failures, 5);
        assert_eq!(result.service_failures, 3);
        assert_eq!(result.errors().len(), 8);
    }

    #[test]
    fn test_empty_result_has_no_batches() {
        let result = BatchProcessingResult::empty();
        assert_eq!(result.total_batches, 0);
        assert_eq!(result.total_plans, 0);
    }

    #[test]
    fn test_success_rate() {
        let now = Utc::now();
        let batches = BatchProcessingResult::from_batches(vec![batch(0, 4, 1, 0)]);
        let result = SyncJobResult::completed(&batches, now, now, Duration::from_millis(12));

        assert!(result.success);
        assert_eq!(result.execution_time_ms, 12);
        assert!((result.success_rate() - 75.0).abs() < f64::EPSILON);

        let empty = SyncJobResult::completed(&BatchProcessingResult::empty(), now, now, Duration::ZERO);
        assert!((empty.success_rate() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_run_carries_single_error() {
        let now = Utc::now();
        let result = SyncJobResult::failed("Circuit Breaker is OPEN", now, now, Duration::ZERO);
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Circuit Breaker is OPEN".to_string()]);
    }
}
