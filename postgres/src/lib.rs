//! `PostgreSQL` plan repository for the plansync pipeline.
//!
//! Implements [`PlanRepository`](plansync_core::repository::PlanRepository)
//! on top of sqlx. Plans live in a `plans` table keyed by a unique
//! `provider_plan_id`, with their zones in `plan_zones`. Every write runs in
//! one transaction that locks the stored row and checks its version, so
//! concurrent writers surface as
//! [`RepositoryError::OptimisticLock`](plansync_core::repository::RepositoryError::OptimisticLock).
//!
//! # Example
//!
//! ```no_run
//! use plansync_postgres::PostgresPlanRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = PostgresPlanRepository::connect("postgres://localhost/plans", 10).await?;
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod repository;

pub use repository::PostgresPlanRepository;
