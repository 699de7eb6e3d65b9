// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Authorization gate for protected operations.
//!
//! The gate resolves the caller, checks the required access level and only
//! then runs the wrapped operation. Refusals use exactly two codes,
//! [`Denial::AuthenticationRequired`] and [`Denial::AuthorizationDenied`], so
//! a caller cannot tell a missing resource from a forbidden one.

use crate::error::Denial;
use crate::events::{SecurityEvent, SecurityEventKind, SecurityEventRecorder};
use crate::identity::{Identity, IdentityResolver, UserIdentity};
use http::{HeaderMap, Request};
use std::future::Future;
use tracing::debug;

/// Access level an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any signed-in account.
    Authenticated,
    /// Administrative capability.
    Elevated,
}

impl Access {
    pub fn as_str(self) -> &'static str {
        match self {
            Access::Authenticated => "authenticated",
            Access::Elevated => "elevated",
        }
    }
}

/// Caller that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub identity: UserIdentity,
    pub elevated: bool,
}

/// Result of an authorization decision.
pub type AuthorizationOutcome = Result<Authorized, Denial>;

#[derive(Clone)]
pub struct AuthorizationGate {
    resolver: IdentityResolver,
    recorder: SecurityEventRecorder,
}

impl AuthorizationGate {
    pub fn new(resolver: IdentityResolver, recorder: SecurityEventRecorder) -> Self {
        Self { resolver, recorder }
    }

    /// Decide whether the caller behind `headers` may access `resource`.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        access: Access,
        resource: &str,
    ) -> AuthorizationOutcome {
        let identity = self.resolver.resolve(headers).await;

        let user = match identity {
            Identity::User(user) => user,
            network => {
                self.recorder
                    .record(
                        SecurityEvent::new(SecurityEventKind::AuthFailure, resource, "invoke")
                            .with_identity(&network)
                            .with_metadata("required", access.as_str()),
                    )
                    .await;
                return Err(Denial::AuthenticationRequired);
            }
        };

        let elevated = user.is_elevated();
        if access == Access::Elevated && !elevated {
            self.recorder
                .record(
                    SecurityEvent::new(SecurityEventKind::AuthzFailure, resource, "invoke")
                        .with_identity(&Identity::User(user))
                        .with_metadata("required", access.as_str()),
                )
                .await;
            return Err(Denial::AuthorizationDenied);
        }

        debug!(user_id = %user.id, elevated, resource, "Access granted");
        Ok(Authorized {
            identity: user,
            elevated,
        })
    }

    /// Run `op` with the request and the authorized caller, or refuse.
    ///
    /// `op` runs at most once and never runs on denial.
    pub async fn invoke<B, F, Fut, T>(
        &self,
        request: Request<B>,
        access: Access,
        op: F,
    ) -> Result<T, Denial>
    where
        F: FnOnce(Request<B>, Authorized) -> Fut,
        Fut: Future<Output = T>,
    {
        let resource = request.uri().path().to_string();
        let authorized = self.authorize(request.headers(), access, &resource).await?;
        Ok(op(request, authorized).await)
    }

    /// Refuse a non-elevated caller addressing another account's resource.
    pub async fn require_owner(
        &self,
        authorized: &Authorized,
        owner_id: &str,
        resource: &str,
    ) -> Result<(), Denial> {
        if authorized.elevated || authorized.identity.id == owner_id {
            return Ok(());
        }

        self.recorder
            .record(
                SecurityEvent::new(SecurityEventKind::IdorAttempt, resource, "access")
                    .with_identity(&Identity::User(authorized.identity.clone())),
            )
            .await;
        Err(Denial::AuthorizationDenied)
    }
}
