//! Event publisher that remembers what it was given.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use plansync_core::event::{PlanEvent, PlanSyncFailed, PlanSynced, PlanUpdated};
use plansync_core::publisher::DomainEventPublisher;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// Captures every published [`PlanEvent`] in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingEventPublisher {
    events: Arc<RwLock<Vec<PlanEvent>>>,
}

impl RecordingEventPublisher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in publication order.
    #[must_use]
    pub fn events(&self) -> Vec<PlanEvent> {
        self.events.read().unwrap().clone()
    }

    /// Number of events recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Whether nothing was published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().unwrap().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.write().unwrap().clear();
    }

    /// `PlanSynced` payloads.
    #[must_use]
    pub fn synced(&self) -> Vec<PlanSynced> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                PlanEvent::Synced(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// `PlanUpdated` payloads.
    #[must_use]
    pub fn updated(&self) -> Vec<PlanUpdated> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                PlanEvent::Updated(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// `PlanSyncFailed` payloads.
    #[must_use]
    pub fn failed(&self) -> Vec<PlanSyncFailed> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                PlanEvent::Failed(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }
}

impl DomainEventPublisher for RecordingEventPublisher {
    fn publish(&self, event: PlanEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.events.write().unwrap().push(event);
        })
    }
}
