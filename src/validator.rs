// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Validator for user-supplied external service endpoints.
//!
//! Validated URLs are later called on the user's behalf, so each rule closes
//! one server-side request forgery vector and all of them must pass:
//!
//! 1. Absolute URL with a host
//! 2. `https` scheme only
//! 3. Host is a domain name, not a literal IP address
//! 4. Default https port
//! 5. Already present in the endpoint registry
//!
//! A literal IP host is recorded as `SSRF_ATTEMPT`; every other rejection is
//! `INVALID_ENDPOINT`.

use crate::error::{CollaboratorError, Denial, EndpointRejection};
use crate::events::{SecurityEvent, SecurityEventKind, SecurityEventRecorder};
use crate::identity::Identity;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use url::{Host, Url};

/// Required scheme for external endpoints.
pub const SECURE_SCHEME: &str = "https";

/// Result of endpoint validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EndpointRejection>,
}

impl EndpointValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: EndpointRejection) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn reason(&self) -> Option<EndpointRejection> {
        self.reason
    }

    pub fn into_result(self) -> Result<(), Denial> {
        match self.reason {
            None if self.valid => Ok(()),
            Some(reason) => Err(Denial::InvalidEndpoint(reason)),
            None => Err(Denial::InvalidEndpoint(EndpointRejection::Unverifiable)),
        }
    }
}

/// Registry of known external services, queried by exact string.
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    async fn contains(&self, url: &str) -> Result<bool, CollaboratorError>;
}

/// Registry held in memory, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    endpoints: HashSet<String>,
}

impl StaticRegistry {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl EndpointRegistry for StaticRegistry {
    async fn contains(&self, url: &str) -> Result<bool, CollaboratorError> {
        Ok(self.endpoints.contains(url))
    }
}

/// Endpoint validator.
#[derive(Clone)]
pub struct EndpointValidator {
    registry: Arc<dyn EndpointRegistry>,
    recorder: SecurityEventRecorder,
}

impl EndpointValidator {
    pub fn new(registry: Arc<dyn EndpointRegistry>, recorder: SecurityEventRecorder) -> Self {
        Self { registry, recorder }
    }

    /// Validate an endpoint URL.
    pub async fn validate(&self, url: &str) -> EndpointValidationResult {
        self.validate_inner(None, url).await
    }

    /// Validate an endpoint URL submitted by `identity`.
    pub async fn validate_as(&self, identity: &Identity, url: &str) -> EndpointValidationResult {
        self.validate_inner(Some(identity), url).await
    }

    async fn validate_inner(
        &self,
        identity: Option<&Identity>,
        url: &str,
    ) -> EndpointValidationResult {
        let (outcome, host) = match check_shape(url) {
            Ok(parsed) => {
                let host = parsed.host_str().map(str::to_string);
                (self.check_registered(url, &parsed).await, host)
            }
            Err(reason) => (Err(reason), None),
        };

        match outcome {
            Ok(()) => {
                debug!(host = ?host, "Endpoint valid");
                EndpointValidationResult::valid()
            }
            Err(reason) => {
                let kind = match reason {
                    EndpointRejection::LiteralIpHost => SecurityEventKind::SsrfAttempt,
                    _ => SecurityEventKind::InvalidEndpoint,
                };
                let mut event = SecurityEvent::new(kind, "endpoint", "validate")
                    .with_metadata("reason", reason.to_string());
                if let Some(host) = host {
                    event = event.with_metadata("host", host);
                }
                if let Some(identity) = identity {
                    event = event.with_identity(identity);
                }
                self.recorder.record(event).await;
                EndpointValidationResult::invalid(reason)
            }
        }
    }

    /// Rule 5: membership of the normalized or the original form.
    async fn check_registered(
        &self,
        original: &str,
        parsed: &Url,
    ) -> Result<(), EndpointRejection> {
        let normalized = normalize(parsed);

        let mut candidates = vec![normalized.as_str()];
        if original != normalized {
            candidates.push(original);
        }

        for candidate in candidates {
            match self.registry.contains(candidate).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(err) => {
                    warn!(error = %err, "Endpoint registry lookup failed");
                    return Err(EndpointRejection::Unverifiable);
                }
            }
        }

        Err(EndpointRejection::Unregistered)
    }
}

/// Rules 1-4, which need no collaborator.
pub fn check_shape(url: &str) -> Result<Url, EndpointRejection> {
    let parsed = Url::parse(url).map_err(|_| EndpointRejection::Malformed)?;

    if parsed.scheme() != SECURE_SCHEME {
        return Err(EndpointRejection::InsecureScheme);
    }

    match parsed.host() {
        None => return Err(EndpointRejection::Malformed),
        Some(Host::Domain(domain)) if domain.is_empty() => return Err(EndpointRejection::Malformed),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => return Err(EndpointRejection::LiteralIpHost),
        Some(Host::Domain(_)) => {}
    }

    // `port()` is `None` for both an omitted port and an explicit 443.
    if parsed.port().is_some() {
        return Err(EndpointRejection::NonDefaultPort);
    }

    Ok(parsed)
}

/// Serialized URL with a single trailing slash removed.
pub fn normalize(url: &Url) -> String {
    let serialized = url.as_str();
    serialized
        .strip_suffix('/')
        .unwrap_or(serialized)
        .to_string()
}
