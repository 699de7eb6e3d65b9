// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Community Guard
//!
//! Access-control and abuse-prevention core for a community registry:
//!
//! - Caller identity resolution (verified account or network address)
//! - Authorization gate for elevated operations
//! - Fixed-window rate limiting over a shared counter store
//! - Server-side request forgery checks for user-supplied endpoints
//! - Shared-secret authentication for scheduled jobs
//! - Severity-classified security event recording
//!
//! Every component fails closed: a collaborator that cannot be reached
//! produces a denial, never an allowance.

pub mod clock;
pub mod config;
pub mod cron;
pub mod db;
pub mod error;
pub mod events;
pub mod gate;
pub mod handlers;
pub mod identity;
pub mod limiter;
pub mod roles;
pub mod slot;
pub mod store;
pub mod validator;

pub use config::Config;
pub use cron::CronAuthenticator;
pub use db::SurrealCounterStore;
pub use error::{CollaboratorError, ConfigError, Denial, EndpointRejection};
pub use events::{SecurityEvent, SecurityEventKind, SecurityEventRecorder, Severity};
pub use gate::{Access, AuthorizationGate, Authorized};
pub use identity::{Identity, IdentityResolver, UserIdentity};
pub use limiter::{RateLimitConfig, RateLimitStatus, RateLimiter, ResourceClass};
pub use roles::{Role, RoleSet};
pub use store::{CounterKey, CounterStore, MemoryCounterStore};
pub use validator::{EndpointValidationResult, EndpointValidator};
