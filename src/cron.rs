// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Authentication for automated (scheduled) callers.
//!
//! Automated callers present a shared secret as a bearer token. The token is
//! compared in constant time once lengths match; a length mismatch returns
//! early, which leaks the secret's length but nothing about its contents.
//! Without a configured secret every automated caller is rejected.
//!
//! A caller with a valid token must also stay within two windows keyed on its
//! network address: a per-minute burst window and a per-day aggregate.

use crate::error::Denial;
use crate::events::{SecurityEvent, SecurityEventKind, SecurityEventRecorder};
use crate::identity::{network_address, Identity};
use crate::limiter::{RateLimitConfig, RateLimiter, CRON_BURST, CRON_DAILY};
use http::{header, HeaderMap};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Authorization scheme prefix.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Outcome of the token comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    /// No secret configured; everything is rejected.
    NotConfigured,
    /// No bearer token on the request.
    Missing,
    /// Lengths differ; the constant-time comparison did not run.
    LengthMismatch,
    /// Same length, different bytes (full constant-time comparison ran).
    Mismatch,
    Match,
}

impl TokenCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenCheck::NotConfigured => "secret_not_configured",
            TokenCheck::Missing => "missing_token",
            TokenCheck::LengthMismatch | TokenCheck::Mismatch => "invalid_token",
            TokenCheck::Match => "ok",
        }
    }
}

/// Compare a presented token against the secret.
pub fn compare_token(provided: &[u8], expected: &[u8]) -> TokenCheck {
    if provided.len() != expected.len() {
        return TokenCheck::LengthMismatch;
    }
    if bool::from(provided.ct_eq(expected)) {
        TokenCheck::Match
    } else {
        TokenCheck::Mismatch
    }
}

/// Bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
}

/// Authenticator for automated callers.
#[derive(Clone)]
pub struct CronAuthenticator {
    secret: Option<String>,
    limiter: RateLimiter,
    recorder: SecurityEventRecorder,
}

impl CronAuthenticator {
    /// An empty secret counts as no secret.
    pub fn new(
        secret: Option<String>,
        limiter: RateLimiter,
        recorder: SecurityEventRecorder,
    ) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            limiter,
            recorder,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    fn check_token(&self, headers: &HeaderMap) -> TokenCheck {
        let Some(secret) = &self.secret else {
            return TokenCheck::NotConfigured;
        };
        match bearer_token(headers) {
            Some(token) => compare_token(token.as_bytes(), secret.as_bytes()),
            None => TokenCheck::Missing,
        }
    }

    /// Token check only.
    pub fn is_authenticated_caller(&self, headers: &HeaderMap) -> bool {
        self.check_token(headers) == TokenCheck::Match
    }

    /// Token check plus both rate-limit windows.
    pub async fn verify(&self, headers: &HeaderMap) -> bool {
        self.authorize(headers).await.is_ok()
    }

    /// Like [`verify`](Self::verify), returning the denial.
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<(), Denial> {
        let identity = Identity::Network {
            address: network_address(headers),
        };

        let check = self.check_token(headers);
        if check != TokenCheck::Match {
            self.recorder
                .record(
                    SecurityEvent::new(SecurityEventKind::CronAuthFailure, "cron", "authenticate")
                        .with_identity(&identity)
                        .with_metadata("reason", check.as_str()),
                )
                .await;
            return Err(Denial::AutomatedCallerRejected);
        }

        for window in [CRON_BURST, CRON_DAILY] {
            self.enforce_window(&identity, &window).await?;
        }

        debug!(caller = %identity, "Automated caller verified");
        Ok(())
    }

    async fn enforce_window(
        &self,
        identity: &Identity,
        window: &RateLimitConfig,
    ) -> Result<(), Denial> {
        self.limiter.enforce(identity, window).await.map(|_| ())
    }
}
