// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error and denial types for the access-control core.
//!
//! Expected denials (missing authentication, exhausted quota, rejected
//! endpoint) are ordinary values of [`Denial`]. Collaborator failures are
//! [`CollaboratorError`]s; callers never see them directly because every
//! public entry point converts them into a closed outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Outcome codes returned to callers when an operation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Authorization denied")]
    AuthorizationDenied,

    #[error("Rate limit exceeded, retry after {} seconds", .retry_after.as_secs())]
    RateLimitExceeded {
        reset_at: DateTime<Utc>,
        retry_after: Duration,
    },

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(EndpointRejection),

    #[error("Automated caller rejected")]
    AutomatedCallerRejected,
}

impl Denial {
    /// Stable machine-readable code for the denial.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::AuthorizationDenied => "AUTHORIZATION_DENIED",
            Self::RateLimitExceeded { .. } => "RATE_LIMITED",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::AutomatedCallerRejected => "AUTOMATED_CALLER_REJECTED",
        }
    }

    /// Retry-after hint, present only for rate-limit denials.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Why an externally supplied endpoint URL was rejected.
///
/// Reasons name the rule that failed and never echo registry contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRejection {
    #[error("endpoint must be an absolute URL with a host")]
    Malformed,

    #[error("endpoint must use the https scheme; plaintext http is not accepted")]
    InsecureScheme,

    #[error("endpoint host must be a domain name, not a literal IP address")]
    LiteralIpHost,

    #[error("endpoint must use the default https port")]
    NonDefaultPort,

    #[error("endpoint is not a registered service")]
    Unregistered,

    #[error("endpoint could not be verified")]
    Unverifiable,
}

/// Failure of an external collaborator (counter store, registry, session
/// lookup, event sink).
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Counter store unavailable: {0}")]
    CounterStore(String),

    #[error("Endpoint registry unavailable: {0}")]
    Registry(String),

    #[error("Session lookup failed: {0}")]
    Session(String),

    #[error("Event sink failed: {0}")]
    EventSink(String),
}

/// Configuration rejected at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid metrics path {path:?}: {reason}")]
    InvalidMetricsPath { path: String, reason: &'static str },

    #[error("Counter store {url:?} keeps counters in process memory")]
    ProcessLocalStore { url: String },
}
