//! Scripted provider client.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use plansync_provider::{ProviderClient, ProviderError, ProviderPlanRecord};
use plansync_runtime::State;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type FetchResult = Result<Vec<ProviderPlanRecord>, ProviderError>;

/// [`ProviderClient`] that replays queued results.
///
/// Queued results are returned first, one per fetch. Once the queue is empty
/// every fetch returns the default plans.
#[derive(Clone, Debug)]
pub struct StubProviderClient {
    queued: Arc<Mutex<VecDeque<FetchResult>>>,
    plans: Arc<Mutex<Vec<ProviderPlanRecord>>>,
    state: Arc<Mutex<State>>,
    delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<AtomicUsize>,
}

impl Default for StubProviderClient {
    fn default() -> Self {
        Self {
            queued: Arc::default(),
            plans: Arc::default(),
            state: Arc::new(Mutex::new(State::Closed)),
            delay: Arc::default(),
            calls: Arc::default(),
        }
    }
}

impl StubProviderClient {
    /// A closed-breaker client with an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose feed is always `plans`.
    #[must_use]
    pub fn with_plans(plans: Vec<ProviderPlanRecord>) -> Self {
        let client = Self::new();
        client.set_plans(plans);
        client
    }

    /// Replace the default feed.
    pub fn set_plans(&self, plans: Vec<ProviderPlanRecord>) {
        *self.plans.lock().unwrap() = plans;
    }

    /// Queue one result for the next unanswered fetch.
    pub fn push_result(&self, result: FetchResult) {
        self.queued.lock().unwrap().push_back(result);
    }

    /// Report `state` as the breaker state.
    pub fn set_circuit_state(&self, state: State) {
        *self.state.lock().unwrap() = state;
    }

    /// Sleep for `delay` inside every fetch.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Fetches performed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderClient for StubProviderClient {
    fn fetch_plans(&self) -> Pin<Box<dyn Future<Output = FetchResult> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let queued = self.queued.lock().unwrap().pop_front();
            queued.unwrap_or_else(|| Ok(self.plans.lock().unwrap().clone()))
        })
    }

    fn circuit_state(&self) -> State {
        *self.state.lock().unwrap()
    }
}
