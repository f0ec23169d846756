//! Outbound port for domain events.

use crate::event::PlanEvent;
use std::future::Future;
use std::pin::Pin;

/// Fire-and-forget sink for [`PlanEvent`]s.
///
/// Publishing never reports failure back to the caller: the sync pipeline does
/// not consult any result and must not be affected by a slow or broken
/// subscriber. Implementations log their own errors.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be shared as
/// `Arc<dyn DomainEventPublisher>`.
pub trait DomainEventPublisher: Send + Sync {
    /// Publish a single event.
    fn publish(&self, event: PlanEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Publish several events in order.
    fn publish_all(&self, events: Vec<PlanEvent>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            for event in events {
                self.publish(event).await;
            }
        })
    }
}
