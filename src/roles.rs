// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Closed role enumeration and capability checks.
//!
//! Role values arrive from storage as strings. They are parsed once, exactly
//! and case-sensitively, into [`Role`]; everything downstream tests
//! capabilities on the enum and never compares strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Moderator,
    Admin,
}

/// A stored role string that does not name a known role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl Role {
    /// Whether this role carries administrative capability.
    pub const fn is_elevated(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Exact match only: `"Admin"`, `" admin"` and `"admins"` are all unknown.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of roles held by an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    /// Build from stored role strings, dropping anything unrecognized.
    pub fn from_stored<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = values
            .into_iter()
            .filter_map(|value| match value.as_ref().parse::<Role>() {
                Ok(role) => Some(role),
                Err(err) => {
                    warn!(error = %err, "Ignoring unrecognized stored role");
                    None
                }
            })
            .collect();
        Self(roles)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// True when any held role is elevated.
    pub fn is_elevated(&self) -> bool {
        self.0.iter().any(|role| role.is_elevated())
    }
}
