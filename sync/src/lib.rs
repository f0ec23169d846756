//! # Plansync Sync
//!
//! The sync pipeline: fetch the provider feed, map records into plans,
//! reconcile them against the store in chunks, and publish domain events.
//!
//! ## Layers
//!
//! - [`scheduler::SyncScheduler`] triggers runs on a fixed delay, skipping a
//!   tick when disabled, already running, or the store is not ready.
//! - [`orchestrator::SyncJobOrchestrator`] runs one sync and is the outermost
//!   error boundary: provider errors and panics become a failed
//!   [`result::SyncJobResult`].
//! - [`batch::BatchProcessor`] chunks the feed and isolates mapping failures.
//! - [`service::SyncPlansService`] reconciles each plan with optimistic-lock
//!   retry and publishes `PlanSynced`, `PlanUpdated` or `PlanSyncFailed`.
//! - [`handlers`] dispatches those events in-process.
//!
//! ## Example
//!
//! ```no_run
//! use plansync_sync::{
//!     BatchProcessor, InProcessEventPublisher, SyncJobOrchestrator, SyncPlansService,
//! };
//! use plansync_core::environment::SystemClock;
//! use plansync_provider::{HttpProviderClient, ProviderSettings};
//! use plansync_testing::InMemoryPlanRepository;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = Arc::new(SystemClock);
//! let service = SyncPlansService::new(
//!     Arc::new(InMemoryPlanRepository::new()),
//!     Arc::new(InProcessEventPublisher::new()),
//!     clock.clone(),
//! );
//! let processor = BatchProcessor::new(Arc::new(service), clock.clone());
//! let client = HttpProviderClient::new(ProviderSettings::default())?;
//! let orchestrator = SyncJobOrchestrator::new(Arc::new(client), processor, clock);
//!
//! let result = orchestrator.orchestrate_full_sync().await;
//! println!("{} of {} plans synced", result.successful_plans, result.total_plans);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod handlers;
pub mod mapping;
pub mod orchestrator;
pub mod result;
pub mod scheduler;
pub mod service;

pub use batch::{BatchProcessor, PlanSync, SyncError};
pub use config::{Config, ConfigError, DatabaseSettings, SyncSettings};
pub use handlers::{
    CacheInvalidationHandler, EventStreamHandler, HandlerError, InProcessEventPublisher,
    PlanEventHandler, SyncMetricsHandler,
};
pub use mapping::MappingError;
pub use orchestrator::{DEFAULT_BATCH_SIZE, SyncJob, SyncJobOrchestrator};
pub use result::{BatchProcessingResult, BatchResult, SyncJobResult};
pub use scheduler::{ReadinessProbe, RepositoryReadiness, SyncScheduler, TickOutcome};
pub use service::SyncPlansService;
