//! Per-plan reconciliation against the repository.
//!
//! For each incoming plan the service looks the stored plan up by its
//! provider id and then does one of three things:
//!
//! - **create** it at version 1 and publish `PlanSynced`,
//! - **update** it to the next version when a field materially changed and
//!   publish `PlanUpdated` with both sides of every change,
//! - **leave it** untouched when nothing changed (no write, no event).
//!
//! An optimistic-lock conflict re-runs the whole lookup-diff-write sequence
//! under the conflict retry policy. Any other error, or a conflict that
//! outlives the policy, drops the plan from the result and publishes
//! `PlanSyncFailed`.

use crate::batch::{PlanSync, SyncError};
use futures::StreamExt;
use plansync_core::environment::Clock;
use plansync_core::event::{PlanEvent, PlanSyncFailed, PlanSynced, PlanUpdated};
use plansync_core::publisher::DomainEventPublisher;
use plansync_core::repository::{PlanRepository, RepositoryError};
use plansync_core::{Plan, PlanChanges};
use plansync_runtime::metrics::SyncMetrics;
use plansync_runtime::{RetryPolicy, retry_with_predicate};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

enum Reconciliation {
    Created(Plan),
    Updated {
        previous: Plan,
        current: Plan,
        changes: PlanChanges,
    },
    Unchanged(Plan),
}

/// Reconciles provider plans with the store and publishes domain events.
#[derive(Clone)]
pub struct SyncPlansService {
    repository: Arc<dyn PlanRepository>,
    publisher: Arc<dyn DomainEventPublisher>,
    clock: Arc<dyn Clock>,
    conflict_retry: RetryPolicy,
    concurrency: usize,
}

impl SyncPlansService {
    /// Create a service that reconciles sequentially with the default conflict retry.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PlanRepository>,
        publisher: Arc<dyn DomainEventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            publisher,
            clock,
            conflict_retry: RetryPolicy::default(),
            concurrency: 1,
        }
    }

    /// Retry policy applied to optimistic-lock conflicts.
    #[must_use]
    pub fn with_conflict_retry(mut self, policy: RetryPolicy) -> Self {
        self.conflict_retry = policy;
        self
    }

    /// Reconcile up to `concurrency` plans at once. Results keep input order.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reconcile `plans`, returning those that were created, updated or
    /// already up to date.
    ///
    /// A plan missing from the result failed; its failure has already been
    /// logged and published.
    #[tracing::instrument(skip_all, fields(plans = plans.len()))]
    pub async fn sync_plans(&self, plans: Vec<Plan>) -> Vec<Plan> {
        if self.concurrency == 1 {
            let mut synced = Vec::with_capacity(plans.len());
            for plan in plans {
                if let Some(plan) = self.sync_plan(plan).await {
                    synced.push(plan);
                }
            }
            return synced;
        }

        futures::stream::iter(plans)
            .map(|plan| self.sync_plan(plan))
            .buffered(self.concurrency)
            .filter_map(futures::future::ready)
            .collect()
            .await
    }

    async fn sync_plan(&self, plan: Plan) -> Option<Plan> {
        let outcome = retry_with_predicate(
            self.conflict_retry.clone(),
            || self.reconcile(&plan),
            RepositoryError::is_conflict,
        )
        .await;

        match outcome {
            Ok(Reconciliation::Created(saved)) => {
                tracing::info!(
                    provider_plan_id = %saved.provider_plan_id(),
                    title = saved.title(),
                    "Plan created"
                );
                self.publisher
                    .publish(PlanSynced::from_plan(&saved, saved.last_updated()).into())
                    .await;
                Some(saved)
            }
            Ok(Reconciliation::Updated {
                previous,
                current,
                changes,
            }) => {
                tracing::info!(
                    provider_plan_id = %current.provider_plan_id(),
                    version = current.version(),
                    changes = %changes,
                    "Plan updated"
                );
                let event =
                    PlanUpdated::between(&previous, &current, &changes, current.last_updated());
                self.publisher.publish(event.into()).await;
                Some(current)
            }
            Ok(Reconciliation::Unchanged(existing)) => {
                tracing::debug!(
                    provider_plan_id = %existing.provider_plan_id(),
                    "No significant changes"
                );
                SyncMetrics::record_unchanged();
                Some(existing)
            }
            Err(e) => {
                tracing::warn!(
                    provider_plan_id = %plan.provider_plan_id(),
                    error = %e,
                    "Failed to sync plan"
                );
                let event = PlanSyncFailed::new(
                    plan.provider_plan_id().clone(),
                    e.to_string(),
                    self.clock.now(),
                );
                self.publisher.publish(PlanEvent::from(event)).await;
                None
            }
        }
    }

    async fn reconcile(&self, incoming: &Plan) -> Result<Reconciliation, RepositoryError> {
        let Some(existing) = self
            .repository
            .find_by_provider_id(incoming.provider_plan_id())
            .await?
        else {
            let saved = self.repository.upsert(incoming.clone()).await?;
            return Ok(Reconciliation::Created(saved));
        };

        let changes = existing.changes_from(incoming);
        if changes.is_empty() {
            return Ok(Reconciliation::Unchanged(existing));
        }

        let updated = existing.update_from_provider(incoming, self.clock.now());
        let saved = self.repository.upsert(updated).await?;
        Ok(Reconciliation::Updated {
            previous: existing,
            current: saved,
            changes,
        })
    }
}

impl PlanSync for SyncPlansService {
    fn sync_plans(
        &self,
        plans: Vec<Plan>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Plan>, SyncError>> + Send + '_>> {
        Box::pin(async move { Ok(Self::sync_plans(self, plans).await) })
    }
}
