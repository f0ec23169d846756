//! End-to-end runs of the sync pipeline against in-memory doubles.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use plansync_core::environment::Clock;
use plansync_runtime::{RetryPolicy, State};
use plansync_sync::{
    BatchProcessor, SyncJob, SyncJobOrchestrator, SyncPlansService, SyncScheduler, TickOutcome,
    RepositoryReadiness,
};
use plansync_testing::{
    InMemoryPlanRepository, PlanRecordBuilder, RecordingEventPublisher, StubProviderClient,
    dec, test_clock,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

struct Pipeline {
    client: StubProviderClient,
    repository: InMemoryPlanRepository,
    publisher: RecordingEventPublisher,
    processor: BatchProcessor,
    orchestrator: SyncJobOrchestrator,
}

fn pipeline(batch_size: usize) -> Pipeline {
    let client = StubProviderClient::new();
    let repository = InMemoryPlanRepository::new();
    let publisher = RecordingEventPublisher::new();
    let clock: Arc<dyn Clock> = Arc::new(test_clock());

    let conflict_retry = RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(1))
        .build();
    let service = SyncPlansService::new(
        Arc::new(repository.clone()),
        Arc::new(publisher.clone()),
        clock.clone(),
    )
    .with_conflict_retry(conflict_retry);
    let processor = BatchProcessor::new(Arc::new(service), clock.clone());
    let orchestrator = SyncJobOrchestrator::new(Arc::new(client.clone()), processor.clone(), clock)
        .with_batch_size(batch_size);

    Pipeline {
        client,
        repository,
        publisher,
        processor,
        orchestrator,
    }
}

#[tokio::test]
async fn test_new_plan_is_created_at_version_one() {
    let p = pipeline(20);
    p.client.set_plans(vec![PlanRecordBuilder::new("P1").title("Concert").price("25.00").build()]);

    let result = p.orchestrator.orchestrate_full_sync().await;

    assert!(result.success);
    assert_eq!(result.successful_plans, 1);
    let stored = p.repository.get("P1").unwrap();
    assert_eq!(stored.version(), 1);
    assert_eq!(stored.title(), "Concert");
    assert_eq!(stored.price_range().min(), dec("25.00"));

    let synced = p.publisher.synced();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].provider_plan_id.as_str(), "P1");
    assert_eq!(synced[0].version, 1);
}

#[tokio::test]
async fn test_identical_feed_is_idempotent() {
    let p = pipeline(20);
    p.client.set_plans(vec![PlanRecordBuilder::new("P1").build()]);

    p.orchestrator.orchestrate_full_sync().await;
    let writes = p.repository.write_count();
    let events = p.publisher.len();

    let result = p.orchestrator.orchestrate_full_sync().await;

    assert!(result.success);
    assert_eq!(result.successful_plans, 1);
    assert_eq!(p.repository.write_count(), writes);
    assert_eq!(p.publisher.len(), events);
    assert!(p.publisher.updated().is_empty());
    assert_eq!(p.repository.get("P1").unwrap().version(), 1);
}

#[tokio::test]
async fn test_title_change_bumps_version_and_publishes_delta() {
    let p = pipeline(20);
    p.client.set_plans(vec![PlanRecordBuilder::new("P1").title("Concert").build()]);
    p.orchestrator.orchestrate_full_sync().await;

    p.client
        .set_plans(vec![PlanRecordBuilder::new("P1").title("Concert - Extended").build()]);
    let result = p.orchestrator.orchestrate_full_sync().await;

    assert!(result.success);
    assert_eq!(p.repository.get("P1").unwrap().version(), 2);

    let updated = p.publisher.updated();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].previous_title, "Concert");
    assert_eq!(updated[0].new_title, "Concert - Extended");
    assert_eq!(updated[0].previous_version, 1);
    assert_eq!(updated[0].new_version, 2);
}

#[tokio::test]
async fn test_persistent_conflict_fails_the_plan() {
    let p = pipeline(20);
    p.repository.always_conflict(true);
    p.client.set_plans(vec![PlanRecordBuilder::new("P1").build()]);

    let result = p.orchestrator.orchestrate_full_sync().await;

    assert!(result.success);
    assert_eq!(result.successful_plans, 0);
    assert_eq!(result.failed_plans, 1);
    assert_eq!(p.repository.upsert_attempts(), 3);
    assert!(p.repository.get("P1").is_none());

    let failed = p.publisher.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].provider_plan_id.as_str(), "P1");
    assert!(p.publisher.synced().is_empty());
}

#[tokio::test]
async fn test_bad_record_does_not_affect_the_rest_of_the_feed() {
    let p = pipeline(2);
    p.client.set_plans(vec![
        PlanRecordBuilder::new("P1").build(),
        PlanRecordBuilder::new("P2").dates("2025-06-01T22:00:00", "2025-06-01T20:00:00").build(),
        PlanRecordBuilder::new("P3").build(),
        PlanRecordBuilder::new("P4").build(),
    ]);

    let result = p.orchestrator.orchestrate_full_sync().await;

    assert!(result.success);
    assert_eq!(result.total_plans, 4);
    assert_eq!(result.successful_plans, 3);
    assert_eq!(result.failed_plans, 1);
    assert!(result.errors[0].starts_with("Plan P2:"));
    assert_eq!(p.repository.len(), 3);
    assert!(p.repository.get("P2").is_none());
    assert_eq!(p.publisher.synced().len(), 3);
}

#[tokio::test]
async fn test_open_breaker_touches_nothing() {
    let p = pipeline(20);
    p.client.set_plans(vec![PlanRecordBuilder::new("P1").build()]);
    p.client.set_circuit_state(State::Open);

    let result = p.orchestrator.orchestrate_full_sync().await;

    assert!(!result.success);
    assert_eq!(p.client.calls(), 0);
    assert_eq!(p.repository.find_count(), 0);
    assert!(p.publisher.is_empty());
}

#[tokio::test]
async fn test_scheduler_skips_when_store_is_unreachable() {
    let p = pipeline(20);
    p.client.set_plans(vec![PlanRecordBuilder::new("P1").build()]);
    p.repository.set_unreachable(true);

    let scheduler = SyncScheduler::new(
        Arc::new(p.orchestrator.clone()),
        Arc::new(RepositoryReadiness::new(Arc::new(p.repository.clone()))),
    );

    assert_eq!(scheduler.tick().await, TickOutcome::NotReady);
    assert_eq!(p.client.calls(), 0);

    p.repository.set_unreachable(false);
    match scheduler.tick().await {
        TickOutcome::Completed(result) => assert_eq!(result.successful_plans, 1),
        other => panic!("expected a completed run, got {other:?}"),
    }
}

#[tokio::test]
async fn test_orchestrator_runs_as_a_job() {
    let p = pipeline(20);
    p.client.set_plans(vec![PlanRecordBuilder::new("P1").build()]);
    let job: Arc<dyn SyncJob> = Arc::new(p.orchestrator.clone());

    let result = job.run().await;

    assert!(result.success);
    assert_eq!(p.repository.len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_batch_accounting_adds_up(
        valid in prop::collection::vec(any::<bool>(), 0..50),
        batch_size in 1usize..25,
    ) {
        let p = pipeline(batch_size);
        let feed = valid
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                let builder = PlanRecordBuilder::new(&format!("P{i}"));
                if *ok { builder.build() } else { builder.without_zones().build() }
            })
            .collect::<Vec<_>>();
        p.client.set_plans(feed);

        let result = tokio_test::block_on(p.orchestrator.orchestrate_full_sync());
        let invalid = valid.iter().filter(|ok| !**ok).count();

        prop_assert!(result.success);
        prop_assert_eq!(result.total_plans, valid.len());
        prop_assert_eq!(result.successful_plans + result.failed_plans, result.total_plans);
        prop_assert_eq!(result.failed_plans, invalid);
        prop_assert_eq!(p.repository.len(), valid.len() - invalid);
    }

    #[test]
    fn prop_feed_is_split_into_ceil_n_over_size_chunks(
        count in 0usize..80,
        batch_size in 1usize..30,
    ) {
        let p = pipeline(batch_size);
        let feed = (0..count)
            .map(|i| PlanRecordBuilder::new(&format!("P{i}")).build())
            .collect::<Vec<_>>();

        let result = tokio_test::block_on(p.processor.process_batch(&feed, batch_size));

        prop_assert_eq!(result.total_batches, count.div_ceil(batch_size));
        prop_assert_eq!(
            result.successful_batches + result.failed_batches + result.partially_failed_batches,
            result.total_batches
        );
        prop_assert!(result.batches.iter().all(|b| b.plans_processed <= batch_size));
        prop_assert_eq!(result.successful_plans, count);
    }
}
