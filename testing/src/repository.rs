//! In-memory plan repository.
//!
//! Enforces the same version contract as the PostgreSQL adapter and lets a
//! test inject conflicts and storage failures.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use plansync_core::repository::{PlanRepository, RepositoryError};
use plansync_core::{INITIAL_VERSION, Plan, ProviderPlanId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// `HashMap`-backed [`PlanRepository`].
///
/// Clones share storage and counters.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPlanRepository {
    plans: Arc<RwLock<HashMap<String, Plan>>>,
    pending_conflicts: Arc<AtomicUsize>,
    always_conflict: Arc<AtomicBool>,
    upsert_failure: Arc<RwLock<Option<String>>>,
    find_failure: Arc<RwLock<Option<String>>>,
    unreachable: Arc<AtomicBool>,
    upsert_attempts: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    finds: Arc<AtomicUsize>,
}

impl InMemoryPlanRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `plan` directly, bypassing the version check and counters.
    pub fn seed(&self, plan: Plan) {
        self.plans
            .write()
            .unwrap()
            .insert(plan.provider_plan_id().as_str().to_string(), plan);
    }

    /// Stored plan for `provider_plan_id`.
    #[must_use]
    pub fn get(&self, provider_plan_id: &str) -> Option<Plan> {
        self.plans.read().unwrap().get(provider_plan_id).cloned()
    }

    /// Number of stored plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.read().unwrap().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.read().unwrap().is_empty()
    }

    /// Make the next `count` upserts fail with an optimistic-lock conflict.
    pub fn conflict_next_upserts(&self, count: usize) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make every upsert fail with an optimistic-lock conflict.
    pub fn always_conflict(&self, enabled: bool) {
        self.always_conflict.store(enabled, Ordering::SeqCst);
    }

    /// Make every upsert fail with a database error.
    pub fn fail_upserts_with(&self, message: &str) {
        *self.upsert_failure.write().unwrap() = Some(message.to_string());
    }

    /// Make every lookup fail with a database error.
    pub fn fail_finds_with(&self, message: &str) {
        *self.find_failure.write().unwrap() = Some(message.to_string());
    }

    /// Make `ping` fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.pending_conflicts.store(0, Ordering::SeqCst);
        self.always_conflict.store(false, Ordering::SeqCst);
        *self.upsert_failure.write().unwrap() = None;
        *self.find_failure.write().unwrap() = None;
        self.unreachable.store(false, Ordering::SeqCst);
    }

    /// Upserts attempted, including failed ones.
    #[must_use]
    pub fn upsert_attempts(&self) -> usize {
        self.upsert_attempts.load(Ordering::SeqCst)
    }

    /// Upserts that changed storage.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Lookups performed.
    #[must_use]
    pub fn find_count(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    fn injected_conflict(&self) -> bool {
        if self.always_conflict.load(Ordering::SeqCst) {
            return true;
        }
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn store(&self, plan: Plan) -> Result<Plan, RepositoryError> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.upsert_failure.read().unwrap().clone() {
            return Err(RepositoryError::Database(message));
        }

        let key = plan.provider_plan_id().as_str().to_string();
        let mut plans = self.plans.write().unwrap();
        let stored_version = plans.get(&key).map(Plan::version);

        if self.injected_conflict() {
            return Err(conflict(&plan, stored_version));
        }

        let accepted = match stored_version {
            None => plan.version() == INITIAL_VERSION,
            Some(stored) => stored == plan.version() - 1,
        };
        if !accepted {
            return Err(conflict(&plan, stored_version));
        }

        plans.insert(key, plan.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(plan)
    }
}

fn conflict(plan: &Plan, actual: Option<i64>) -> RepositoryError {
    RepositoryError::OptimisticLock {
        provider_plan_id: plan.provider_plan_id().clone(),
        expected: plan.version() - 1,
        actual,
    }
}

impl PlanRepository for InMemoryPlanRepository {
    fn find_by_provider_id<'a>(
        &'a self,
        provider_plan_id: &'a ProviderPlanId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Plan>, RepositoryError>> + Send + 'a>> {
        Box::pin(async move {
            self.finds.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = self.find_failure.read().unwrap().clone() {
                return Err(RepositoryError::Database(message));
            }
            Ok(self.get(provider_plan_id.as_str()))
        })
    }

    fn upsert(
        &self,
        plan: Plan,
    ) -> Pin<Box<dyn Future<Output = Result<Plan, RepositoryError>> + Send + '_>> {
        Box::pin(async move { self.store(plan) })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + '_>> {
        Box::pin(async move {
            if self.unreachable.load(Ordering::SeqCst) {
                Err(RepositoryError::Database("connection refused".to_string()))
            } else {
                Ok(())
            }
        })
    }
}
