//! Environment-driven configuration.
//!
//! Every tunable has a default. Unset or unparsable values fall back to it,
//! except the provider URL (must be a valid `http(s)` URL) and
//! `DATABASE_URL` (required by the binary).
//!
//! | Variable | Default |
//! |---|---|
//! | `PROVIDER_URL` | [`DEFAULT_PROVIDER_URL`] |
//! | `PROVIDER_TIMEOUT_MS` | `5000` |
//! | `PROVIDER_RETRY_ATTEMPTS` | `3` |
//! | `PROVIDER_RETRY_DELAY_MS` | `100` |
//! | `PROVIDER_RETRY_MULTIPLIER` | `2.0` |
//! | `CIRCUIT_BREAKER_WINDOW_SIZE` | `10` |
//! | `CIRCUIT_BREAKER_MINIMUM_CALLS` | `5` |
//! | `CIRCUIT_BREAKER_FAILURE_RATE` | `50` |
//! | `CIRCUIT_BREAKER_OPEN_WAIT_MS` | `30000` |
//! | `CIRCUIT_BREAKER_HALF_OPEN_CALLS` | `3` |
//! | `SYNC_ENABLED` | `true` |
//! | `SYNC_INTERVAL_SECS` | `10` |
//! | `SYNC_BATCH_SIZE` | `20` |
//! | `SYNC_CONCURRENCY` | `1` |
//! | `SYNC_CONFLICT_RETRY_ATTEMPTS` | `3` |
//! | `DATABASE_URL` | none |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `READINESS_TIMEOUT_SECS` | `3` |
//! | `METRICS_ADDR` | unset |

use plansync_provider::{DEFAULT_PROVIDER_URL, ProviderSettings};
use plansync_runtime::{CircuitBreakerConfig, RetryPolicy};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set to a value that cannot be used.
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Scheduling and reconciliation settings.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Administrative on/off switch.
    pub enabled: bool,
    /// Fixed delay between runs.
    pub interval: Duration,
    /// Records per chunk.
    pub batch_size: usize,
    /// Plans reconciled concurrently inside one chunk.
    pub concurrency: usize,
    /// Retry policy for optimistic-lock conflicts.
    pub conflict_retry: RetryPolicy,
    /// Limit for the readiness probe.
    pub readiness_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            batch_size: 20,
            concurrency: 1,
            conflict_retry: RetryPolicy::default(),
            readiness_timeout: Duration::from_secs(3),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Connection string, when configured.
    pub url: Option<String>,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Provider client settings.
    pub provider: ProviderSettings,
    /// Sync pipeline settings.
    pub sync: SyncSettings,
    /// Database settings.
    pub database: DatabaseSettings,
    /// Bind address for the Prometheus endpoint.
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PROVIDER_URL` is not a usable URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PROVIDER_URL` is not a usable URL.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(lookup);
        let url = env.get("PROVIDER_URL").unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string());
        validate_url(&url)?;

        let retry = RetryPolicy::builder()
            .max_attempts(env.parse("PROVIDER_RETRY_ATTEMPTS").unwrap_or(3))
            .initial_delay(Duration::from_millis(
                env.parse("PROVIDER_RETRY_DELAY_MS").unwrap_or(100),
            ))
            .multiplier(env.parse("PROVIDER_RETRY_MULTIPLIER").unwrap_or(2.0))
            .build();

        let circuit_breaker = CircuitBreakerConfig::builder()
            .window_size(env.parse("CIRCUIT_BREAKER_WINDOW_SIZE").unwrap_or(10))
            .minimum_calls(env.parse("CIRCUIT_BREAKER_MINIMUM_CALLS").unwrap_or(5))
            .failure_rate_threshold(env.parse("CIRCUIT_BREAKER_FAILURE_RATE").unwrap_or(50.0))
            .open_wait(Duration::from_millis(
                env.parse("CIRCUIT_BREAKER_OPEN_WAIT_MS").unwrap_or(30_000),
            ))
            .half_open_calls(env.parse("CIRCUIT_BREAKER_HALF_OPEN_CALLS").unwrap_or(3))
            .build();

        let provider = ProviderSettings {
            url,
            timeout: Duration::from_millis(env.parse("PROVIDER_TIMEOUT_MS").unwrap_or(5_000)),
            retry,
            circuit_breaker,
        };

        let sync = SyncSettings {
            enabled: env.get("SYNC_ENABLED").map_or(true, |s| parse_flag(&s)),
            interval: Duration::from_secs(env.parse::<u64>("SYNC_INTERVAL_SECS").unwrap_or(10).max(1)),
            batch_size: env.parse::<usize>("SYNC_BATCH_SIZE").unwrap_or(20).max(1),
            concurrency: env.parse::<usize>("SYNC_CONCURRENCY").unwrap_or(1).max(1),
            conflict_retry: RetryPolicy::builder()
                .max_attempts(env.parse("SYNC_CONFLICT_RETRY_ATTEMPTS").unwrap_or(3))
                .build(),
            readiness_timeout: Duration::from_secs(
                env.parse("READINESS_TIMEOUT_SECS").unwrap_or(3),
            ),
        };

        let database = DatabaseSettings {
            url: env.get("DATABASE_URL"),
            max_connections: env.parse("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
        };

        Ok(Self {
            provider,
            sync,
            database,
            metrics_addr: env.parse("METRICS_ADDR"),
        })
    }

    /// The database connection string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `DATABASE_URL` is not set.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|s| s.trim().parse().ok())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::Invalid {
        name: "PROVIDER_URL",
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name: "PROVIDER_URL",
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    Ok(())
}
