// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for abuse simulation against the access-control core.
//!
//! Provides attack patterns, input generators and outcome metrics, plus a
//! [`Fixture`] wiring the components over an in-memory store and a manual
//! clock.

#![allow(dead_code)]

pub mod attacks;
pub mod generators;
pub mod metrics;

use community_guard::{
    clock::ManualClock,
    cron::CronAuthenticator,
    error::CollaboratorError,
    events::{EventSink, SecurityEvent, SecurityEventRecorder},
    gate::AuthorizationGate,
    identity::{IdentityResolver, SessionProvider, UserIdentity},
    limiter::RateLimiter,
    roles::RoleSet,
    store::{CounterStore, MemoryCounterStore},
    validator::{EndpointValidator, StaticRegistry},
};
use async_trait::async_trait;
use http::HeaderMap;
use std::sync::{Arc, Mutex};

/// Start of simulated time.
pub const T0: i64 = 1_700_000_000_000;

pub const CRON_SECRET: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f0";

pub const REGISTERED: &[&str] = &[
    "https://registry.example.com",
    "https://hooks.example.org/inbound",
];

/// Header carrying a test account id.
pub const TEST_USER_HEADER: &str = "x-test-user";

/// Header carrying comma-separated stored role strings for the test account.
pub const TEST_ROLES_HEADER: &str = "x-test-roles";

/// Sessions taken from test headers, with roles parsed like stored ones.
pub struct HeaderSessions;

#[async_trait]
impl SessionProvider for HeaderSessions {
    async fn verified_user(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<UserIdentity>, CollaboratorError> {
        let Some(id) = headers.get(TEST_USER_HEADER).and_then(|v| v.to_str().ok()) else {
            return Ok(None);
        };
        let roles = headers
            .get(TEST_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        Ok(Some(UserIdentity::new(
            id,
            RoleSet::from_stored(roles.split(',').filter(|r| !r.is_empty())),
        )))
    }
}

/// Sink keeping every escalated event.
#[derive(Default)]
pub struct CapturingSink {
    pub persisted: Mutex<Vec<SecurityEvent>>,
    pub alerted: Mutex<Vec<SecurityEvent>>,
}

#[async_trait]
impl EventSink for CapturingSink {
    async fn persist(&self, event: &SecurityEvent) -> Result<(), CollaboratorError> {
        self.persisted.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn alert(&self, event: &SecurityEvent) -> Result<(), CollaboratorError> {
        self.alerted.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Components wired over shared in-memory collaborators.
pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub sink: Arc<CapturingSink>,
    pub recorder: SecurityEventRecorder,
    pub resolver: IdentityResolver,
    pub limiter: RateLimiter,
    pub gate: AuthorizationGate,
    pub validator: EndpointValidator,
    pub cron: CronAuthenticator,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_counters(Arc::new(MemoryCounterStore::new()))
    }

    pub fn with_counters(counters: Arc<dyn CounterStore>) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let sink = Arc::new(CapturingSink::default());
        let recorder = SecurityEventRecorder::new(sink.clone()).unwrap();
        let resolver = IdentityResolver::new(Arc::new(HeaderSessions));
        let limiter = RateLimiter::with_clock(counters, clock.clone(), recorder.clone());
        let gate = AuthorizationGate::new(resolver.clone(), recorder.clone());
        let validator = EndpointValidator::new(
            Arc::new(StaticRegistry::new(REGISTERED.iter().copied())),
            recorder.clone(),
        );
        let cron = CronAuthenticator::new(
            Some(CRON_SECRET.to_string()),
            limiter.clone(),
            recorder.clone(),
        );

        Self {
            clock,
            sink,
            recorder,
            resolver,
            limiter,
            gate,
            validator,
            cron,
        }
    }
}
