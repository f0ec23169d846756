//! `plansync` - keeps the plan inventory in step with the provider feed.
//!
//! Configuration comes from the environment (and `.env` in development).
//! Run with `DATABASE_URL=postgres://... cargo run --bin plansync`.

use anyhow::Context;
use plansync_core::environment::{Clock, SystemClock};
use plansync_postgres::PostgresPlanRepository;
use plansync_provider::HttpProviderClient;
use plansync_runtime::metrics::MetricsServer;
use plansync_sync::{
    BatchProcessor, CacheInvalidationHandler, Config, EventStreamHandler, InProcessEventPublisher,
    RepositoryReadiness, SyncJobOrchestrator, SyncMetricsHandler, SyncPlansService,
    SyncScheduler,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CACHE_INVALIDATION_CAPACITY: usize = 1024;
const EVENT_STREAM_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        provider_url = %config.provider.url,
        interval_secs = config.sync.interval.as_secs(),
        batch_size = config.sync.batch_size,
        enabled = config.sync.enabled,
        "Starting plansync"
    );

    let _metrics = config
        .metrics_addr
        .map(MetricsServer::install)
        .transpose()
        .context("failed to start metrics server")?;

    let database_url = config.database_url().context("database is not configured")?;
    let repository =
        PostgresPlanRepository::connect(database_url, config.database.max_connections)
            .await
            .context("failed to connect to PostgreSQL")?;
    repository.migrate().await.context("failed to run migrations")?;
    tracing::info!("PostgreSQL connected and migrated");
    let repository = Arc::new(repository);

    let client = HttpProviderClient::new(config.provider.clone())
        .context("failed to build provider client")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let publisher = InProcessEventPublisher::new()
        .with_handler(Arc::new(SyncMetricsHandler))
        .with_handler(Arc::new(CacheInvalidationHandler::new(CACHE_INVALIDATION_CAPACITY)))
        .with_handler(Arc::new(EventStreamHandler::new(EVENT_STREAM_CAPACITY)));

    let service = SyncPlansService::new(repository.clone(), Arc::new(publisher), clock.clone())
        .with_conflict_retry(config.sync.conflict_retry.clone())
        .with_concurrency(config.sync.concurrency);
    let processor = BatchProcessor::new(Arc::new(service), clock.clone());
    let orchestrator = SyncJobOrchestrator::new(Arc::new(client), processor, clock)
        .with_batch_size(config.sync.batch_size);
    let scheduler = SyncScheduler::new(
        Arc::new(orchestrator),
        Arc::new(RepositoryReadiness::new(repository)),
    )
    .with_settings(&config.sync);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            // Keep the sender alive so the scheduler is not stopped.
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // The first interval tick fires immediately, so one sync runs at startup.
    scheduler.run(shutdown_rx).await;

    tracing::info!("plansync stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,plansync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
