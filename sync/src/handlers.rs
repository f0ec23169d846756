//! In-process dispatch of plan events to local handlers.
//!
//! Publishing is fire-and-forget. A handler that fails is logged and the
//! remaining handlers still run; nothing flows back to the sync pipeline.

use plansync_core::event::PlanEvent;
use plansync_core::publisher::DomainEventPublisher;
use plansync_core::ProviderPlanId;
use plansync_runtime::metrics::{EventMetrics, SyncMetrics};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// A handler could not process an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Handler error: {0}")]
pub struct HandlerError(pub String);

/// Reacts to published [`PlanEvent`]s.
pub trait PlanEventHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if the event could not be handled. The error
    /// is logged by the publisher and otherwise ignored.
    fn handle<'a>(
        &'a self,
        event: &'a PlanEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;
}

/// [`DomainEventPublisher`] that calls every registered handler in order.
#[derive(Clone, Default)]
pub struct InProcessEventPublisher {
    handlers: Vec<Arc<dyn PlanEventHandler>>,
}

impl InProcessEventPublisher {
    /// Publisher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers run in registration order.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn PlanEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl DomainEventPublisher for InProcessEventPublisher {
    fn publish(&self, event: PlanEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let event_type = event.event_type();
            EventMetrics::record_published(event_type);

            for handler in &self.handlers {
                if let Err(e) = handler.handle(&event).await {
                    tracing::warn!(
                        handler = handler.name(),
                        event_type,
                        event_id = %event.metadata().event_id,
                        error = %e,
                        "Event handler failed"
                    );
                }
            }
        })
    }
}

/// Logs every event and counts it by kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncMetricsHandler;

impl PlanEventHandler for SyncMetricsHandler {
    fn name(&self) -> &'static str {
        "sync_metrics"
    }

    fn handle<'a>(
        &'a self,
        event: &'a PlanEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(async move {
            match event {
                PlanEvent::Synced(e) => {
                    tracing::info!(
                        plan_id = %e.plan_id,
                        provider_plan_id = %e.provider_plan_id,
                        title = %e.title,
                        "Plan synced"
                    );
                    SyncMetrics::record_created();
                }
                PlanEvent::Updated(e) => {
                    tracing::info!(
                        plan_id = %e.plan_id,
                        provider_plan_id = %e.provider_plan_id,
                        previous_version = e.previous_version,
                        new_version = e.new_version,
                        changes = e.changes.len(),
                        "Plan updated"
                    );
                    SyncMetrics::record_updated();
                }
                PlanEvent::Failed(e) => {
                    tracing::warn!(
                        provider_plan_id = %e.provider_plan_id,
                        reason = %e.failure_reason,
                        "Plan sync failed"
                    );
                    SyncMetrics::record_failed();
                }
            }
            Ok(())
        })
    }
}

/// Broadcasts the provider id of every created or updated plan so read-side
/// caches can evict it.
#[derive(Debug, Clone)]
pub struct CacheInvalidationHandler {
    sender: broadcast::Sender<ProviderPlanId>,
}

impl CacheInvalidationHandler {
    /// Create a handler whose channel buffers `capacity` ids per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive future invalidations.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderPlanId> {
        self.sender.subscribe()
    }
}

impl PlanEventHandler for CacheInvalidationHandler {
    fn name(&self) -> &'static str {
        "cache_invalidation"
    }

    fn handle<'a>(
        &'a self,
        event: &'a PlanEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(async move {
            if matches!(event, PlanEvent::Failed(_)) {
                return Ok(());
            }

            let id = event.provider_plan_id().clone();
            // No subscribers is not an error.
            let receivers = self.sender.send(id.clone()).unwrap_or(0);
            tracing::debug!(provider_plan_id = %id, receivers, "Cache invalidated");
            EventMetrics::record_cache_invalidation();
            Ok(())
        })
    }
}

/// Encodes every event as JSON and broadcasts the payload to outbound
/// adapters.
#[derive(Debug, Clone)]
pub struct EventStreamHandler {
    sender: broadcast::Sender<String>,
}

impl EventStreamHandler {
    /// Create a handler whose channel buffers `capacity` payloads per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive future payloads.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

impl PlanEventHandler for EventStreamHandler {
    fn name(&self) -> &'static str {
        "event_stream"
    }

    fn handle<'a>(
        &'a self,
        event: &'a PlanEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = event.to_json().map_err(|e| HandlerError(e.to_string()))?;
            tracing::debug!(event_type = event.event_type(), %payload, "Event encoded");
            let receivers = self.sender.send(payload).unwrap_or(0);
            tracing::trace!(receivers, "Event payload broadcast");
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use plansync_core::event::{PlanSyncFailed, PlanSynced, PlanUpdated};
    use plansync_testing::{PlanBuilder, utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    impl PlanEventHandler for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn handle<'a>(
            &'a self,
            event: &'a PlanEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(event.event_type());
                if self.fail {
                    return Err(HandlerError("unreachable downstream".to_string()));
                }
                Ok(())
            })
        }
    }

    const AT: &str = "2025-01-01T00:00:00";

    fn synced(id: &str) -> PlanEvent {
        let plan = PlanBuilder::new(id).build();
        PlanSynced::from_plan(&plan, utc(AT)).into()
    }

    fn updated(id: &str) -> PlanEvent {
        let previous = PlanBuilder::new(id).build();
        let incoming = PlanBuilder::new(id).title("Renamed").build();
        let changes = previous.changes_from(&incoming);
        let current = previous.update_from_provider(&incoming, utc(AT));
        PlanUpdated::between(&previous, &current, &changes, utc(AT)).into()
    }

    fn failed(id: &str) -> PlanEvent {
        PlanSyncFailed::new(ProviderPlanId::new(id).unwrap(), "conflict", utc(AT)).into()
    }

    #[tokio::test]
    async fn test_handlers_run_in_order_despite_failures() {
        let failing = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let healthy = Arc::new(Recording::default());
        let publisher = InProcessEventPublisher::new()
            .with_handler(failing.clone())
            .with_handler(healthy.clone());

        publisher.publish_all(vec![synced("P1"), failed("P2")]).await;

        assert_eq!(publisher.handler_count(), 2);
        assert_eq!(*failing.seen.lock().unwrap(), vec!["PlanSynced.v1", "PlanSyncFailed.v1"]);
        assert_eq!(*healthy.seen.lock().unwrap(), vec!["PlanSynced.v1", "PlanSyncFailed.v1"]);
    }

    #[tokio::test]
    async fn test_publisher_without_handlers_is_a_no_op() {
        InProcessEventPublisher::new().publish(synced("P1")).await;
    }

    #[tokio::test]
    async fn test_metrics_handler_accepts_every_kind() {
        let handler = SyncMetricsHandler;
        for event in [synced("P1"), updated("P1"), failed("P1")] {
            assert!(handler.handle(&event).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_cache_invalidation_broadcasts_created_and_updated() {
        let handler = CacheInvalidationHandler::new(16);
        let mut receiver = handler.subscribe();

        handler.handle(&synced("P1")).await.unwrap();
        handler.handle(&failed("P2")).await.unwrap();
        handler.handle(&updated("P3")).await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().as_str(), "P1");
        assert_eq!(receiver.recv().await.unwrap().as_str(), "P3");
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_event_stream_sends_json_payloads() {
        let handler = EventStreamHandler::new(16);
        let mut receiver = handler.subscribe();

        handler.handle(&synced("P1")).await.unwrap();
        handler.handle(&failed("P2")).await.unwrap();

        let first = receiver.recv().await.unwrap();
        assert!(first.contains("\"type\":\"Synced\""));
        assert!(first.contains("\"provider_plan_id\":\"P1\""));
        let second = receiver.recv().await.unwrap();
        assert!(second.contains("\"type\":\"Failed\""));
        assert!(second.contains("\"provider_plan_id\":\"P2\""));
    }

    #[tokio::test]
    async fn test_cache_invalidation_without_subscribers_succeeds() {
        let handler = CacheInvalidationHandler::new(1);
        assert!(handler.handle(&synced("P1")).await.is_ok());
    }
}
