// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Caller identity resolution.
//!
//! A caller is either a verified account (from the session collaborator) or,
//! failing that, a best-effort network address taken from trusted proxy
//! headers. Resolution never fails: the weakest outcome is the
//! [`UNKNOWN_ADDRESS`] sentinel, which downstream components treat as the
//! most restrictive identity.

use crate::error::CollaboratorError;
use crate::roles::RoleSet;
use async_trait::async_trait;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sentinel address for callers whose network origin cannot be determined.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Forwarded-chain header; only the first (client-most) entry is used.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Single-address header set by the fronting proxy.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub roles: RoleSet,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.roles.is_elevated()
    }
}

/// Network address as reported by the proxy, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress(String);

impl NetworkAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_ADDRESS.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_ADDRESS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminant used in rate-limit counter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    User,
    Network,
}

impl IdentityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            IdentityKind::User => "user",
            IdentityKind::Network => "network",
        }
    }
}

/// The attributable caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    User(UserIdentity),
    Network { address: NetworkAddress },
}

impl Identity {
    pub fn network(address: impl Into<String>) -> Self {
        Identity::Network {
            address: NetworkAddress::new(address),
        }
    }

    pub fn kind(&self) -> IdentityKind {
        match self {
            Identity::User(_) => IdentityKind::User,
            Identity::Network { .. } => IdentityKind::Network,
        }
    }

    /// Value used verbatim as the rate-limit key component.
    pub fn key_value(&self) -> &str {
        match self {
            Identity::User(user) => &user.id,
            Identity::Network { address } => address.as_str(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Identity::Network { address } if address.is_unknown())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.key_value())
    }
}

/// Verified-session lookup collaborator.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Return the verified account behind the request, if any.
    async fn verified_user(&self, headers: &HeaderMap)
        -> Result<Option<UserIdentity>, CollaboratorError>;
}

/// Session provider for deployments with no session layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSessions;

#[async_trait]
impl SessionProvider for NoSessions {
    async fn verified_user(
        &self,
        _headers: &HeaderMap,
    ) -> Result<Option<UserIdentity>, CollaboratorError> {
        Ok(None)
    }
}

/// Resolves the caller identity of inbound requests.
#[derive(Clone)]
pub struct IdentityResolver {
    sessions: Arc<dyn SessionProvider>,
}

impl IdentityResolver {
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Self {
        Self { sessions }
    }

    /// Resolve the caller identity. Never fails.
    pub async fn resolve(&self, headers: &HeaderMap) -> Identity {
        match self.sessions.verified_user(headers).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "Resolved session identity");
                return Identity::User(user);
            }
            Ok(None) => {}
            Err(err) => {
                // Degrade to the network identity: less trust, never more.
                warn!(error = %err, "Session lookup failed, falling back to network identity");
            }
        }

        Identity::Network {
            address: network_address(headers),
        }
    }
}

/// Extract the caller's network address from trusted proxy headers.
pub fn network_address(headers: &HeaderMap) -> NetworkAddress {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|entry| !entry.is_empty());

    if let Some(address) = forwarded {
        return NetworkAddress::new(address);
    }

    let real_ip = headers
        .get(REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|entry| !entry.is_empty());

    match real_ip {
        Some(address) => NetworkAddress::new(address),
        None => NetworkAddress::unknown(),
    }
}
