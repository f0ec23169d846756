//! Error types for the provider client.

use plansync_runtime::{State, TimeoutError};
use std::fmt;
use thiserror::Error;

/// Longest slice of an error response body kept for diagnostics.
pub const BODY_PREVIEW_CHARS: usize = 200;

/// Classification of a provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection, DNS or transport failure
    NetworkError,
    /// Body was not a decodable feed
    ParseError,
    /// Response was structurally unusable (e.g. empty)
    InvalidResponse,
    /// Provider answered with a non-success status
    HttpError {
        /// HTTP status code
        status: u16,
        /// Leading part of the response body
        body_preview: String,
    },
    /// Circuit breaker refused the call
    CircuitBreakerOpen,
    /// The overall time limit elapsed
    Timeout,
    /// Anything else
    UnexpectedError,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkError => f.write_str("NETWORK_ERROR"),
            Self::ParseError => f.write_str("PARSE_ERROR"),
            Self::InvalidResponse => f.write_str("INVALID_RESPONSE"),
            Self::HttpError { status, .. } => write!(f, "HTTP_ERROR({status})"),
            Self::CircuitBreakerOpen => f.write_str("CIRCUIT_BREAKER_OPEN"),
            Self::Timeout => f.write_str("TIMEOUT"),
            Self::UnexpectedError => f.write_str("UNEXPECTED_ERROR"),
        }
    }
}

/// A failed provider fetch.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
}

impl ProviderError {
    /// Transport-level failure.
    pub fn network(cause: impl fmt::Display) -> Self {
        Self {
            kind: ProviderErrorKind::NetworkError,
            message: format!("Network error while fetching from provider: {cause}"),
        }
    }

    /// Undecodable feed.
    pub fn parse(cause: impl fmt::Display) -> Self {
        Self {
            kind: ProviderErrorKind::ParseError,
            message: format!("Failed to parse provider response: {cause}"),
        }
    }

    /// Structurally unusable response.
    pub fn invalid_response(detail: impl fmt::Display) -> Self {
        Self {
            kind: ProviderErrorKind::InvalidResponse,
            message: format!("Invalid provider response: {detail}"),
        }
    }

    /// Non-success status. Only the first [`BODY_PREVIEW_CHARS`] characters
    /// of `body` are kept.
    #[must_use]
    pub fn http(status: u16, body: &str) -> Self {
        let body_preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        Self {
            message: format!("HTTP error {status} from provider. Response: {body_preview}"),
            kind: ProviderErrorKind::HttpError {
                status,
                body_preview,
            },
        }
    }

    /// The circuit breaker rejected the call.
    #[must_use]
    pub fn circuit_breaker_open(state: State) -> Self {
        Self {
            kind: ProviderErrorKind::CircuitBreakerOpen,
            message: format!("Circuit breaker is {state} - provider may be down"),
        }
    }

    /// The overall time limit elapsed.
    #[must_use]
    pub fn timeout(cause: TimeoutError) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            message: format!("Timeout while fetching from provider: {cause}"),
        }
    }

    /// Failure outside the other categories.
    pub fn unexpected(cause: impl fmt::Display) -> Self {
        Self {
            kind: ProviderErrorKind::UnexpectedError,
            message: format!("Unexpected error while fetching from provider: {cause}"),
        }
    }

    /// Failure category.
    #[must_use]
    pub const fn kind(&self) -> &ProviderErrorKind {
        &self.kind
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether another attempt may succeed.
    ///
    /// Network failures, server errors, 408 and 429 are transient. Parse
    /// errors, invalid responses and other client errors are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match &self.kind {
            ProviderErrorKind::NetworkError => true,
            ProviderErrorKind::HttpError { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ProviderErrorKind::ParseError
            | ProviderErrorKind::InvalidResponse
            | ProviderErrorKind::CircuitBreakerOpen
            | ProviderErrorKind::Timeout
            | ProviderErrorKind::UnexpectedError => false,
        }
    }
}
