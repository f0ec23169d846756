//! Persistence port for plans.

use crate::{Plan, ProviderPlanId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from a [`PlanRepository`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Another writer changed the plan between read and write.
    ///
    /// `actual` is `None` when a concurrent writer created the plan first.
    #[error(
        "Optimistic lock conflict for plan {provider_plan_id}: expected stored version {expected}, found {actual:?}"
    )]
    OptimisticLock {
        /// Plan being written.
        provider_plan_id: ProviderPlanId,
        /// Version the writer expected to replace (0 for a new plan).
        expected: i64,
        /// Version actually stored.
        actual: Option<i64>,
    },

    /// Connection or query failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored data no longer satisfies the domain invariants.
    #[error("Corrupt plan data: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    /// Whether the error is an optimistic-lock conflict worth retrying.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::OptimisticLock { .. })
    }
}

/// Store of reconciled plans, keyed by [`ProviderPlanId`].
///
/// # Optimistic Concurrency
///
/// [`upsert`](Self::upsert) derives the expected stored version from the
/// plan itself: a plan at version 1 must not exist yet, and a plan at version
/// `n > 1` must replace stored version `n - 1`. Any other stored state yields
/// [`RepositoryError::OptimisticLock`].
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be shared as
/// `Arc<dyn PlanRepository>`.
pub trait PlanRepository: Send + Sync {
    /// Find a plan by its external key.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on storage failure and
    /// [`RepositoryError::Corrupt`] if the stored row is invalid.
    fn find_by_provider_id<'a>(
        &'a self,
        provider_plan_id: &'a ProviderPlanId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Plan>, RepositoryError>> + Send + 'a>>;

    /// Insert or replace a plan, enforcing the version check.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::OptimisticLock`] on a version mismatch and
    /// [`RepositoryError::Database`] on storage failure.
    fn upsert(
        &self,
        plan: Plan,
    ) -> Pin<Box<dyn Future<Output = Result<Plan, RepositoryError>> + Send + '_>>;

    /// Lightweight connectivity check.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] when the store is unreachable.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + '_>>;
}
