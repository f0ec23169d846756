//! # Plansync Testing
//!
//! Test doubles and fixtures for the plan sync pipeline. Every double is
//! cheap to clone and clones share state, so a test keeps one handle for
//! assertions and hands another to the code under test.
//!
//! - [`FixedClock`]: deterministic, manually advanced time
//! - [`InMemoryPlanRepository`]: version-checked store with conflict and failure injection
//! - [`RecordingEventPublisher`]: captures published events in order
//! - [`StubProviderClient`]: scripted fetch results and breaker state
//! - [`PlanRecordBuilder`] / [`PlanBuilder`]: provider records and domain plans
//!
//! ## Example
//!
//! ```
//! use plansync_testing::{InMemoryPlanRepository, PlanBuilder};
//! use plansync_core::repository::PlanRepository;
//!
//! # async fn example() -> Result<(), plansync_core::repository::RepositoryError> {
//! let repository = InMemoryPlanRepository::new();
//! repository.upsert(PlanBuilder::new("P1").title("Concert").build()).await?;
//!
//! assert_eq!(repository.get("P1").map(|p| p.version()), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod fixtures;
pub mod provider;
pub mod publisher;
pub mod repository;

pub use clock::{FixedClock, test_clock};
pub use fixtures::{PlanBuilder, PlanRecordBuilder, dec, utc};
pub use provider::StubProviderClient;
pub use publisher::RecordingEventPublisher;
pub use repository::InMemoryPlanRepository;
