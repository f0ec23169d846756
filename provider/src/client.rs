//! Provider client port and its HTTP implementation.

use crate::error::{ProviderError, ProviderErrorKind};
use crate::record::ProviderPlanRecord;
use crate::xml;
use plansync_runtime::metrics::ProviderMetrics;
use plansync_runtime::{
    CircuitBreaker, CircuitBreakerConfig, ResilienceError, ResiliencePipeline, RetryPolicy, State,
};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Feed URL used when none is configured.
pub const DEFAULT_PROVIDER_URL: &str = "https://provider.code-challenge.feverup.com/api/events";

/// Source of provider plan records.
///
/// # Dyn Compatibility
///
/// Returns boxed futures so the client can be held as
/// `Arc<dyn ProviderClient>`.
pub trait ProviderClient: Send + Sync {
    /// Fetch the current feed, keeping only plans sold online.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the feed could not be obtained.
    fn fetch_plans(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderPlanRecord>, ProviderError>> + Send + '_>>;

    /// Current state of the circuit breaker guarding the fetch.
    fn circuit_state(&self) -> State;
}

/// Settings for [`HttpProviderClient`].
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Feed URL
    pub url: String,
    /// Overall limit for one fetch, retries included
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
    /// Circuit breaker tuning
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROVIDER_URL.to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Fetches the XML feed over HTTP behind time limit, circuit breaker and retry.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    http: reqwest::Client,
    url: String,
    pipeline: ResiliencePipeline,
}

impl HttpProviderClient {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns an unexpected error if the HTTP client cannot be constructed.
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .build()
            .map_err(ProviderError::unexpected)?;

        Ok(Self {
            http,
            url: settings.url,
            pipeline: ResiliencePipeline::new(
                settings.timeout,
                CircuitBreaker::new(settings.circuit_breaker),
                settings.retry,
            ),
        })
    }

    /// Feed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Breaker guarding the fetch, for manual control.
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        self.pipeline.breaker()
    }

    /// Fetch the feed through the resilience pipeline.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the last attempt, or a circuit
    /// breaker or timeout error from the outer layers.
    pub async fn fetch(&self) -> Result<Vec<ProviderPlanRecord>, ProviderError> {
        let started = Instant::now();
        tracing::info!(url = %self.url, "Fetching plans from provider");

        let this = self;
        let result = self
            .pipeline
            .execute(move || this.fetch_once(), ProviderError::is_transient)
            .await;

        let elapsed = started.elapsed();
        match result {
            Ok(plans) => {
                ProviderMetrics::record_fetch(plans.len(), elapsed);
                tracing::info!(
                    count = plans.len(),
                    duration_ms = elapsed.as_millis(),
                    "Fetched plans from provider"
                );
                Ok(plans)
            }
            Err(ResilienceError::CircuitOpen(state)) => {
                tracing::warn!(state = %state, "Provider call rejected by circuit breaker");
                Err(ProviderError::circuit_breaker_open(state))
            }
            Err(ResilienceError::Timeout(timeout)) => {
                tracing::warn!(
                    duration_ms = elapsed.as_millis(),
                    "Provider timed out, it may be experiencing delays"
                );
                Err(ProviderError::timeout(timeout))
            }
            Err(ResilienceError::Inner(err)) => {
                match err.kind() {
                    ProviderErrorKind::HttpError { status, .. } if *status >= 500 => {
                        tracing::warn!(
                            status,
                            "Provider temporarily unavailable, will retry on next sync"
                        );
                    }
                    _ => tracing::error!(error = %err, "Failed to fetch plans"),
                }
                Err(err)
            }
        }
    }

    async fn fetch_once(&self) -> Result<Vec<ProviderPlanRecord>, ProviderError> {
        tracing::debug!("Making HTTP call to provider");

        let response = self.http.get(&self.url).send().await.map_err(|e| {
            if e.is_builder() {
                ProviderError::unexpected(e)
            } else {
                ProviderError::network(e)
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::network)?;

        if !status.is_success() {
            return Err(ProviderError::http(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Err(ProviderError::invalid_response("Empty response from provider"));
        }

        let plans = xml::parse_online_plans(&body)?;
        tracing::debug!(count = plans.len(), "Parsed online plans from provider response");
        Ok(plans)
    }
}

impl ProviderClient for HttpProviderClient {
    fn fetch_plans(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderPlanRecord>, ProviderError>> + Send + '_>>
    {
        Box::pin(self.fetch())
    }

    fn circuit_state(&self) -> State {
        self.pipeline.breaker().state()
    }
}
